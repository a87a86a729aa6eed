pub mod api;
pub mod live;
pub mod outwebook;
pub mod pages;
