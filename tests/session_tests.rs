use webserv::http::request::HttpRequest;
use webserv::http::response::HttpResponse;
use webserv::session::SessionStore;

fn cookie_value(res: &HttpResponse, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    res.cookies
        .iter()
        .find(|c| c.starts_with(&prefix))
        .map(|c| {
            let rest = &c[prefix.len()..];
            rest.split(';').next().unwrap_or("").to_string()
        })
}

#[test]
fn test_new_client_gets_session_and_visit_one() {
    let mut store = SessionStore::new(1800);
    let request = HttpRequest::new();
    let mut response = HttpResponse::new(200);

    store.decorate_response(&request, &mut response, false);

    assert_eq!(cookie_value(&response, "visits").as_deref(), Some("1"));
    let id = cookie_value(&response, "session_id").expect("session cookie missing");
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_returning_client_increments_visits() {
    let mut store = SessionStore::new(1800);

    let first = HttpRequest::new();
    let mut issued = HttpResponse::new(200);
    store.decorate_response(&first, &mut issued, false);
    let id = cookie_value(&issued, "session_id").unwrap();

    let mut request = HttpRequest::new();
    request.cookies.insert("session_id".to_string(), id);
    request.cookies.insert("visits".to_string(), "4".to_string());
    let mut response = HttpResponse::new(200);
    store.decorate_response(&request, &mut response, false);

    assert_eq!(cookie_value(&response, "visits").as_deref(), Some("5"));
    // The live session is reused, not reissued.
    assert!(cookie_value(&response, "session_id").is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_stale_session_cookie_keeps_counter() {
    let mut store = SessionStore::new(1800);

    let mut request = HttpRequest::new();
    request
        .cookies
        .insert("session_id".to_string(), "gone0000000000000000000000000000".to_string());
    request.cookies.insert("visits".to_string(), "7".to_string());
    let mut response = HttpResponse::new(200);
    store.decorate_response(&request, &mut response, false);

    // A presented session id, even one the store no longer knows, keeps
    // the visit counter going and is not replaced.
    assert_eq!(cookie_value(&response, "visits").as_deref(), Some("8"));
    assert!(cookie_value(&response, "session_id").is_none());
    assert_eq!(store.len(), 0);
}

#[test]
fn test_garbage_visits_cookie_restarts_at_one() {
    let mut store = SessionStore::new(1800);

    let mut request = HttpRequest::new();
    request
        .cookies
        .insert("session_id".to_string(), "gone0000000000000000000000000000".to_string());
    request.cookies.insert("visits".to_string(), "junk".to_string());
    let mut response = HttpResponse::new(200);
    store.decorate_response(&request, &mut response, false);

    assert_eq!(cookie_value(&response, "visits").as_deref(), Some("1"));
}
