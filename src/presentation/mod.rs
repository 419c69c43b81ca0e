//! HTML views: the compiled-in form page and the runtime error page.

pub mod views;
