//! # Events Module
//!
//! Typed notifications from the catalog core to whatever consumes it.
//!
//! ## Design
//! The scanner, the catalog store and the thumbnail cache never call back
//! into a UI. They emit events through channels, and the consumer (CLI,
//! GUI) drains them on its own thread.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Scan(ScanEvent::Progress(p)) => println!("{}/{}", p.current, p.total),
//!             Event::Thumbnail(ThumbnailEvent::Loaded { media_id, .. }) => redraw(media_id),
//!             _ => {}
//!         }
//!     }
//! });
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
