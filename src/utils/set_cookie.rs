pub struct SetCookie {
    name: String,
    value: String,
    path: String,
    max_age: Option<u64>,
    expires: Option<String>,
    hardened: bool,
}

impl SetCookie {
    pub fn new(name: &str, value: &str) -> Self {
        SetCookie {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            max_age: None,
            expires: None,
            hardened: false,
        }
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expires(mut self, when: &str) -> Self {
        self.expires = Some(when.to_string());
        self
    }

    /// Emit HttpOnly/SameSite/Secure attributes. Off by default so the wire
    /// format only changes when the configuration asks for it.
    pub fn hardened(mut self, on: bool) -> Self {
        self.hardened = on;
        self
    }

    pub fn to_header(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);

        header.push_str(&format!("; Path={}", self.path));

        if let Some(age) = self.max_age {
            header.push_str(&format!("; Max-Age={}", age));
        }
        if let Some(when) = &self.expires {
            header.push_str(&format!("; Expires={}", when));
        }
        if self.hardened {
            header.push_str("; HttpOnly; SameSite=Lax; Secure");
        }

        header
    }
}
