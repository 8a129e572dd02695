//! HTTP front end for the rate limiter.
//!
//! `GET /?datasource=<id>&user=<uid>` answers with the admission decision:
//!
//! | Outcome   | Status                      | Body            |
//! |-----------|-----------------------------|-----------------|
//! | `Allowed` | `200 OK`                    | empty           |
//! | `Denied`  | `429 Too Many Requests`     | denial message  |
//! | `Invalid` | `400 Bad Request`           | reason          |
//! | `Backend` | `500 Internal Server Error` | empty           |
//!
//! `GET /health` returns `OK`.

mod server;
mod service;

pub use server::HttpServer;
pub use service::{router, CheckParams};
