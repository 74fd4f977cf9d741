pub mod app;
pub mod image;
pub mod mesh;
pub mod scene;
pub mod util;
