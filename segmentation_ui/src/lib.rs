mod branding;
mod page;
mod routes;
mod server;

pub mod app;

pub use app::start_app;
pub use branding::Branding;
pub use page::{escape_html, render_page, PageContext, PageState};
pub use routes::UiError;
pub use server::{build_router, HttpServer, UiState};
