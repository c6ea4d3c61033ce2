//! # Families — Per-Shape `FamilySieve` Implementations
//!
//! Four representative families covering the distinct coordinate/bitmap
//! shapes from spec §3.2: a single-bitmap BSGS family (`kbn`), a paired
//! two-form BSGS family (`twin`, `carol_kynea`), and a non-BSGS incremental
//! family (`factorial`). Every other family named in spec §1 shares one of
//! these shapes and is out of scope for this crate (documented in
//! `SPEC_FULL.md` and `DESIGN.md` as a scoping decision, not a silent drop).

pub mod carol_kynea;
pub mod factorial;
pub mod kbn;
pub mod twin;
