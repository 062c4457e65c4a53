pub mod connection;
pub mod request;
pub mod response;

pub use connection::{ClientPhase, HttpConnection};
pub use request::{HttpRequest, Method, ParseError, ParseProgress, ParsingState};
pub use response::{HttpResponse, ResponseBody};
