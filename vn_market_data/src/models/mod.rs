pub mod asset;
pub mod bar;
pub mod bar_time;
pub mod interval;
pub mod request_params;
