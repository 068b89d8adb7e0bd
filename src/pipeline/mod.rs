//! Pipeline stages for turning one deck into a preview and a code image.
//!
//! Each submodule implements exactly one step. [`task`] strings them
//! together for a single deck; the batch layer only ever sees
//! [`task::ConversionTask`].
//!
//! ## Data Flow
//!
//! ```text
//! identity ──▶ converter ──▶ render ──▶ (url) ──▶ qr ──▶ style ──▶ caption ──▶ compose ──▶ encode
//!  (FileId)    (soffice)    (pdfium)             (raster) (mask)   (SVG text)  (canvas)    (PNG)
//! ```
//!
//! 1. [`identity`]  — mint the id every artifact is keyed by
//! 2. [`converter`] — external document conversion behind [`converter::SlideConverter`]
//! 3. [`render`]    — rasterise the intermediate PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 4. [`qr`]        — encode the preview URL at level M
//! 5. [`style`]     — rounded / shadow / gradient treatments
//! 6. [`caption`]   — caption text and escaping, rendered through resvg
//! 7. [`compose`]   — lay everything out on the canvas
//! 8. [`encode`]    — PNG encoding shared by slides and code images

pub mod caption;
pub mod compose;
pub mod converter;
pub mod encode;
pub mod identity;
pub mod qr;
pub mod render;
pub mod style;
pub mod task;
