pub mod set_cookie;
