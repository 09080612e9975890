//! Host integration.

mod frame_loop;

pub use frame_loop::insert_ticker;
