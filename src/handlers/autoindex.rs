use crate::http::response::error_response;
use crate::prelude::*;

const DELETE_SCRIPT: &str = "<script>\
function deleteFile(path){\
if(confirm('Delete this file?')){\
fetch(path,{method:'DELETE'}).then(function(r){\
if(r.ok){window.location.reload();}else{alert('Delete failed');}});}}\
</script>";

/// Synthesized directory listing: parent link, then one row per entry with
/// name, byte size (or `-` for directories), mtime and a Delete action.
pub fn generate(dir: &Path, url_path: &str, cfg: &ServerConfig) -> HttpResponse {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return error_response(HTTP_NOT_FOUND, Some(cfg))
        }
        Err(_) => return error_response(HTTP_INTERNAL_SERVER_ERROR, Some(cfg)),
    };

    let display_path = if url_path.len() > 1 {
        url_path.trim_end_matches('/')
    } else {
        url_path
    };

    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Index of {display_path}</title>{DELETE_SCRIPT}</head>\n\
         <body>\n<h1>Index of {display_path}</h1>\n\
         <table>\n<tr><th>Name</th><th>Size</th><th>Last Modified</th><th></th></tr>\n"
    );

    if display_path != "/" {
        let parent = match display_path.rfind('/') {
            Some(0) | None => "/",
            Some(idx) => &display_path[..idx],
        };
        html.push_str(&format!(
            "<tr><td><a href=\"{parent}\">..</a></td><td>-</td><td>-</td><td></td></tr>\n"
        ));
    }

    let base = if display_path == "/" { "" } else { display_path };
    let mut rows: Vec<(String, bool, u64, String)> = Vec::new();

    for entry in entries.flatten() {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mtime = metadata
            .modified()
            .map(weblog::format_time)
            .unwrap_or_else(|_| "-".to_string());
        rows.push((name, metadata.is_dir(), metadata.len(), mtime));
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, is_dir, size, mtime) in rows {
        let entry_url = format!("{base}/{name}");
        let size_cell = if is_dir {
            "-".to_string()
        } else {
            format!("{} bytes", size)
        };
        let action = if is_dir {
            String::new()
        } else {
            format!("<a href=\"#\" onclick=\"deleteFile('{entry_url}')\">Delete</a>")
        };
        let suffix = if is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<tr><td><a href=\"{entry_url}{suffix}\">{name}</a></td>\
             <td>{size_cell}</td><td>{mtime}</td><td>{action}</td></tr>\n"
        ));
    }

    html.push_str("</table>\n</body>\n</html>\n");

    let mut res = HttpResponse::new(HTTP_OK);
    res.set_body(html.into_bytes(), "text/html");
    res
}
