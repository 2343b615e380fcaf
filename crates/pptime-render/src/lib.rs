//! # pptime-render
//!
//! Document encoders for pptime report books.
//!
//! This crate provides:
//! - Excel workbooks with one structured table per pivot view
//!
//! ## Example
//!
//! ```rust,ignore
//! use pptime_core::{DocumentWriter, ReportBook};
//! use pptime_render::ExcelWriter;
//!
//! let writer = ExcelWriter::new().hours_format("0.0");
//! writer.write(&book, Path::new("timereports/time_report_2024-03-09-07-05-01.xlsx"))?;
//! ```

pub mod excel;

pub use excel::ExcelWriter;
