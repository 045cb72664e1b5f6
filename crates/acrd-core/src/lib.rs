//! Core types and parsing for acrd.
//!
//! This crate has no I/O. It defines what the device quarry produces and how
//! tool output is read, and is shared by the CLI and its tests.
//!
//! # Modules
//!
//! - [`device`]: device profile, boot modes, enumeration candidates
//! - [`error`]: tool and quarry failures with remediation hints
//! - [`parse`]: parsers for `adb`/`fastboot` output
//! - [`usb`]: USB ids for query-less transports (EDL)
//! - [`advice`]: error advisor prompt template
//!
//! # Boot modes
//!
//! | Mode | Tool | Serial | Profile source |
//! |------|------|--------|----------------|
//! | **adb** | `adb` | yes | `getprop` |
//! | **fastboot / fastbootd** | `fastboot` | yes | `getvar` |
//! | **download** | `heimdall` | no | placeholder |
//! | **edl** | none | no | placeholder (USB ids) |

pub mod advice;
pub mod device;
pub mod error;
pub mod parse;
pub mod usb;
