pub mod analysis;
pub mod call;
pub mod net;
pub mod roadmap;
pub mod room;
pub mod task;
pub mod time;
