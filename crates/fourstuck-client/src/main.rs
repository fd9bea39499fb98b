//! 4stuck Client
//!
//! Yew WASM frontend for a running game session.
//!
//! Build for the browser with `trunk build`. Browser APIs are only called at
//! runtime, so the crate also compiles natively for `cargo test`.

mod app;
mod components;
mod hooks;
mod pages;
mod routes;
mod services;

use app::App;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_web::MakeWebConsoleWriter;

fn main() {
    console_error_panic_hook::set_once();

    let filter = EnvFilter::new("info,fourstuck_core=debug");

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new())
        .with_filter(filter);

    tracing_subscriber::registry().with(fmt_layer).init();

    yew::Renderer::<App>::new().render();
}
