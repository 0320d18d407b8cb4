pub mod capture;
pub mod crawl;
pub mod db;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod nutrients;
pub mod writer;
