pub mod activity;
pub mod websocket;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    activity::configure(cfg);
    websocket::configure(cfg);
}
