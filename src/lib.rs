//! # swmm-inp
//!
//! A parser and canonical serializer for the SWMM INP model input format:
//! bracket-labeled sections of whitespace-delimited, fixed-width tables with
//! comment-carried descriptions.
//!
//! Loading a document extracts every recognized section into typed records and
//! exposes merged entity views (nodes with their coordinates and tags,
//! conduits with their cross sections, inflows folded with dry weather flow).
//! Writing produces deterministic canonical text that reads back unchanged.

pub mod inp;

pub use inp::{
    Document, FieldType, InfiltrationKind, InpError, LoadOptions, Record, Recovery, SectionKind,
    SupportFilePolicy, Value,
};
