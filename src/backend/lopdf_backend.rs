//! Fallback image backend built on [`lopdf`].
//!
//! Walks the object graph directly: for each page, the `/XObject` entries of
//! its (possibly inherited) `/Resources` whose `/Subtype` is `/Image`, in
//! resource-dictionary order, descending into Form XObjects along the way. Dimensions come straight from `/Width` and
//! `/Height`, so detection never has to decode a single sample.
//!
//! Decoding covers what real-world PDFs mostly contain: JPEG (`DCTDecode`)
//! and raw or Flate/LZW-compressed samples in gray, RGB, CMYK, ICC-based and
//! indexed colour spaces. JPEG 2000, JBIG2 and CCITT fax images are reported
//! as [`BackendError::UnsupportedEncoding`]; they still count for detection.

use super::raster::{samples_to_image, ColourSpace};
use super::{EmbeddedImage, ImageSource, ImageVisitor};
use crate::error::BackendError;
use image::{DynamicImage, ImageFormat};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use tracing::{debug, trace};

const NAME: &str = "lopdf";

/// The pure-Rust backend. Stateless; every scan parses the document afresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfSource;

impl ImageSource for LopdfSource {
    fn name(&self) -> &'static str {
        NAME
    }

    fn scan(&self, pdf: &[u8], visit: &mut ImageVisitor<'_>) -> Result<(), BackendError> {
        let document = Document::load_mem(pdf).map_err(|e| BackendError::OpenFailed {
            backend: NAME,
            detail: e.to_string(),
        })?;

        let pages = document.get_pages();
        debug!("lopdf: {} pages", pages.len());

        for (position, page_id) in pages.values().copied().enumerate() {
            let page = position + 1;
            let resources = page_resources(&document, page_id).map_err(|detail| {
                BackendError::PageFailed {
                    backend: NAME,
                    page,
                    detail,
                }
            })?;
            let Some(resources) = resources else {
                continue;
            };

            let found = image_xobjects(&document, resources);
            for (index, (resources, stream)) in found.into_iter().enumerate() {
                let candidate = LopdfImage {
                    document: &document,
                    resources,
                    stream,
                    page,
                    index: index + 1,
                };
                if visit(&candidate).is_break() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

/// One image XObject found on a page.
struct LopdfImage<'a> {
    document: &'a Document,
    resources: &'a Dictionary,
    stream: &'a Stream,
    page: usize,
    index: usize,
}

impl LopdfImage<'_> {
    fn failed(&self, detail: impl Into<String>) -> BackendError {
        BackendError::ImageFailed {
            page: self.page,
            index: self.index,
            detail: detail.into(),
        }
    }

    fn integer(&self, key: &[u8]) -> Result<i64, BackendError> {
        let obj = self
            .stream
            .dict
            .get(key)
            .map_err(|_| self.failed(format!("missing /{}", String::from_utf8_lossy(key))))?;
        deref(self.document, obj)
            .and_then(|o| o.as_i64().ok())
            .ok_or_else(|| self.failed(format!("/{} is not an integer", String::from_utf8_lossy(key))))
    }

    fn is_mask(&self) -> bool {
        self.stream
            .dict
            .get(b"ImageMask")
            .ok()
            .and_then(|o| deref(self.document, o))
            .and_then(|o| o.as_bool().ok())
            .unwrap_or(false)
    }

    fn decode_raw(&self, width: u32, height: u32, filters: &[&[u8]]) -> Result<DynamicImage, BackendError> {
        let data = if filters.is_empty() {
            self.stream.content.clone()
        } else {
            self.stream
                .decompressed_content()
                .map_err(|e| self.failed(format!("decompression failed: {e}")))?
        };

        let (space, bpc) = if self.is_mask() {
            (ColourSpace::Gray, 1)
        } else {
            let space_obj = self
                .stream
                .dict
                .get(b"ColorSpace")
                .map_err(|_| self.failed("missing /ColorSpace"))?;
            let space = colour_space(self.document, Some(self.resources), space_obj, 0)
                .map_err(|e| self.failed(e))?;
            let bpc = self.integer(b"BitsPerComponent")?;
            let bpc = u8::try_from(bpc).map_err(|_| self.failed(format!("BitsPerComponent {bpc}")))?;
            (space, bpc)
        };

        trace!(
            "lopdf: page {} image {} raw {}x{} {:?} {} bpc",
            self.page,
            self.index,
            width,
            height,
            space,
            bpc
        );
        samples_to_image(&data, width, height, bpc, &space).map_err(|e| self.failed(e))
    }
}

impl EmbeddedImage for LopdfImage<'_> {
    fn page(&self) -> usize {
        self.page
    }

    fn index(&self) -> usize {
        self.index
    }

    fn dimensions(&self) -> Result<(u32, u32), BackendError> {
        let width = self.integer(b"Width")?;
        let height = self.integer(b"Height")?;
        let width = u32::try_from(width).map_err(|_| self.failed(format!("invalid width {width}")))?;
        let height =
            u32::try_from(height).map_err(|_| self.failed(format!("invalid height {height}")))?;
        Ok((width, height))
    }

    fn decode(&self) -> Result<DynamicImage, BackendError> {
        let (width, height) = self.dimensions()?;
        let filters = filters(self.document, &self.stream.dict);

        match filters.last().copied() {
            Some(b"DCTDecode") | Some(b"DCT") => {
                if filters.len() > 1 {
                    return Err(self.unsupported("chained DCTDecode"));
                }
                image::load_from_memory_with_format(&self.stream.content, ImageFormat::Jpeg)
                    .map_err(|e| self.failed(format!("JPEG decode failed: {e}")))
            }
            Some(f @ (b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode" | b"CCF")) => {
                Err(self.unsupported(&String::from_utf8_lossy(f)))
            }
            _ => self.decode_raw(width, height, &filters),
        }
    }
}

impl LopdfImage<'_> {
    fn unsupported(&self, filter: &str) -> BackendError {
        BackendError::UnsupportedEncoding {
            page: self.page,
            index: self.index,
            filter: filter.to_string(),
        }
    }
}

// ── Object-graph helpers ────────────────────────────────────────────────────

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    doc.dereference(obj).ok().map(|(_, o)| o)
}

/// Look up `key` on the page, walking `/Parent` links for inherited values.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>, String> {
    let mut current = page_id;
    // Page trees deeper than this are malformed (or cyclic).
    for _ in 0..64 {
        let dict = doc
            .get_object(current)
            .and_then(|o| o.as_dict())
            .map_err(|e| format!("page dictionary: {e}"))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(None),
        }
    }
    Err("page tree too deep".to_string())
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>, String> {
    match inherited(doc, page_id, b"Resources")? {
        Some(obj) => deref(doc, obj)
            .and_then(|o| o.as_dict().ok())
            .map(Some)
            .ok_or_else(|| "/Resources is not a dictionary".to_string()),
        None => Ok(None),
    }
}

/// Form XObjects nested deeper than this are not searched.
const MAX_FORM_DEPTH: usize = 16;

/// Image XObjects reachable from a resource dictionary, in dictionary order,
/// each paired with the resources it was found in.
///
/// Form XObjects are searched in place through their own `/Resources`, so a
/// figure wrapped in a form keeps its position in the page's image order.
/// Each referenced object is visited at most once per page.
fn image_xobjects<'a>(doc: &'a Document, resources: &'a Dictionary) -> Vec<(&'a Dictionary, &'a Stream)> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    collect_xobjects(doc, resources, 0, &mut seen, &mut found);
    found
}

fn collect_xobjects<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    found: &mut Vec<(&'a Dictionary, &'a Stream)>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| deref(doc, o))
        .and_then(|o| o.as_dict().ok())
    else {
        return;
    };

    for (name, obj) in xobjects.iter() {
        if let Object::Reference(id) = obj {
            if !seen.insert(*id) {
                continue;
            }
        }
        let Some(stream) = deref(doc, obj).and_then(|o| o.as_stream().ok()) else {
            debug!("lopdf: XObject /{} is not a stream", String::from_utf8_lossy(name));
            continue;
        };

        match stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) {
            Some(b"Image") => found.push((resources, stream)),
            Some(b"Form") if depth >= MAX_FORM_DEPTH => {
                debug!("lopdf: form /{} nested too deep, not searched", String::from_utf8_lossy(name));
            }
            Some(b"Form") => {
                // A form without /Resources draws from the page's, already listed.
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| deref(doc, o))
                    .and_then(|o| o.as_dict().ok())
                {
                    collect_xobjects(doc, inner, depth + 1, seen, found);
                }
            }
            _ => {}
        }
    }
}

/// `/Filter` as a list of names (a single name or an array).
fn filters<'a>(doc: &'a Document, dict: &'a Dictionary) -> Vec<&'a [u8]> {
    let Some(obj) = dict.get(b"Filter").ok().and_then(|o| deref(doc, o)) else {
        return Vec::new();
    };
    match obj {
        Object::Name(name) => vec![name.as_slice()],
        Object::Array(items) => items
            .iter()
            .filter_map(|o| deref(doc, o).and_then(|o| o.as_name().ok()))
            .collect(),
        _ => Vec::new(),
    }
}

fn device_space(name: &[u8]) -> Option<ColourSpace> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Some(ColourSpace::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(ColourSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Some(ColourSpace::Cmyk),
        _ => None,
    }
}

/// Resolve a `/ColorSpace` value into something [`samples_to_image`] handles.
fn colour_space(
    doc: &Document,
    resources: Option<&Dictionary>,
    obj: &Object,
    depth: u8,
) -> Result<ColourSpace, String> {
    if depth > 4 {
        return Err("colour space nesting too deep".to_string());
    }
    let obj = deref(doc, obj).ok_or("dangling /ColorSpace reference")?;

    match obj {
        Object::Name(name) => {
            if let Some(space) = device_space(name) {
                return Ok(space);
            }
            // A named resource, e.g. /CS0 → /Resources/ColorSpace/CS0
            let named = resources
                .and_then(|r| r.get(b"ColorSpace").ok())
                .and_then(|o| deref(doc, o))
                .and_then(|o| o.as_dict().ok())
                .and_then(|d| d.get(name).ok())
                .ok_or_else(|| format!("unknown colour space /{}", String::from_utf8_lossy(name)))?;
            colour_space(doc, None, named, depth + 1)
        }
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|o| deref(doc, o))
                .and_then(|o| o.as_name().ok())
                .ok_or("empty colour space array")?;

            match family {
                b"ICCBased" => {
                    let profile = items
                        .get(1)
                        .and_then(|o| deref(doc, o))
                        .and_then(|o| o.as_stream().ok())
                        .ok_or("ICCBased without profile stream")?;
                    let n = profile
                        .dict
                        .get(b"N")
                        .ok()
                        .and_then(|o| deref(doc, o))
                        .and_then(|o| o.as_i64().ok())
                        .ok_or("ICC profile without /N")?;
                    ColourSpace::from_component_count(n)
                        .ok_or_else(|| format!("ICC profile with {n} components"))
                }
                b"Indexed" | b"I" => {
                    let base = items.get(1).ok_or("Indexed without base")?;
                    let base = colour_space(doc, resources, base, depth + 1)?;
                    let hival = items
                        .get(2)
                        .and_then(|o| deref(doc, o))
                        .and_then(|o| o.as_i64().ok())
                        .ok_or("Indexed without hival")?;
                    let lookup = match items.get(3).and_then(|o| deref(doc, o)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(stream)) if stream.dict.get(b"Filter").is_ok() => stream
                            .decompressed_content()
                            .map_err(|e| format!("palette stream: {e}"))?,
                        Some(Object::Stream(stream)) => stream.content.clone(),
                        _ => return Err("Indexed without lookup table".to_string()),
                    };
                    Ok(ColourSpace::Indexed {
                        base: Box::new(base),
                        hival: hival.clamp(0, 255) as u8,
                        lookup,
                    })
                }
                other => device_space(other)
                    .ok_or_else(|| format!("unsupported colour space /{}", String::from_utf8_lossy(other))),
            }
        }
        _ => Err("malformed /ColorSpace".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use std::ops::ControlFlow;

    /// A one-page document whose page resources hold the given image streams.
    fn document_with_images(images: Vec<Stream>) -> Vec<u8> {
        document_with_xobjects(|doc| {
            let mut xobjects = Dictionary::new();
            for (i, image) in images.into_iter().enumerate() {
                let id = doc.add_object(image);
                xobjects.set(format!("Im{}", i + 1), id);
            }
            xobjects
        })
    }

    /// A one-page document whose page `/XObject` dictionary is built by `build`.
    fn document_with_xobjects(build: impl FnOnce(&mut Document) -> Dictionary) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let xobjects = build(&mut doc);

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => dictionary! { "XObject" => xobjects },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn raw_image(width: i64, height: i64, space: &str, components: usize, fill: u8) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => space,
                "BitsPerComponent" => 8,
            },
            vec![fill; width as usize * height as usize * components],
        )
    }

    fn form(xobjects: Dictionary) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Resources" => dictionary! { "XObject" => xobjects },
            },
            b"q 100 0 0 100 0 0 cm /Im1 Do Q".to_vec(),
        )
    }

    fn collect(pdf: &[u8]) -> Vec<(usize, usize, Result<(u32, u32), BackendError>, bool)> {
        let mut seen = Vec::new();
        LopdfSource
            .scan(pdf, &mut |img: &dyn EmbeddedImage| {
                seen.push((img.page(), img.index(), img.dimensions(), img.decode().is_ok()));
                ControlFlow::Continue(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn finds_images_in_resource_order() {
        let pdf = document_with_images(vec![
            raw_image(60, 40, "DeviceRGB", 3, 128),
            raw_image(8, 8, "DeviceGray", 1, 0),
        ]);
        let seen = collect(&pdf);
        assert_eq!(seen.len(), 2);
        assert_eq!((seen[0].0, seen[0].1), (1, 1));
        assert_eq!(seen[0].2, Ok((60, 40)));
        assert!(seen[0].3);
        assert_eq!((seen[1].0, seen[1].1), (1, 2));
        assert_eq!(seen[1].2, Ok((8, 8)));
    }

    #[test]
    fn image_inside_form_is_found() {
        let pdf = document_with_xobjects(|doc| {
            let image = doc.add_object(raw_image(100, 100, "DeviceGray", 1, 200));
            let fm1 = doc.add_object(form(dictionary! { "Im1" => image }));
            dictionary! { "Fm1" => fm1 }
        });
        let seen = collect(&pdf);
        assert_eq!(seen.len(), 1);
        assert_eq!((seen[0].0, seen[0].1), (1, 1));
        assert_eq!(seen[0].2, Ok((100, 100)));
        assert!(seen[0].3);
    }

    #[test]
    fn index_runs_across_forms() {
        let pdf = document_with_xobjects(|doc| {
            let direct = doc.add_object(raw_image(60, 60, "DeviceRGB", 3, 1));
            let wrapped = doc.add_object(raw_image(70, 70, "DeviceGray", 1, 2));
            let last = doc.add_object(raw_image(80, 80, "DeviceGray", 1, 3));
            let fm1 = doc.add_object(form(dictionary! { "Im1" => wrapped }));
            dictionary! { "Im1" => direct, "Fm1" => fm1, "Im2" => last }
        });
        let seen: Vec<_> = collect(&pdf).into_iter().map(|s| (s.1, s.2)).collect();
        assert_eq!(seen, vec![(1, Ok((60, 60))), (2, Ok((70, 70))), (3, Ok((80, 80)))]);
    }

    #[test]
    fn self_referencing_form_terminates() {
        let pdf = document_with_xobjects(|doc| {
            let image = doc.add_object(raw_image(64, 64, "DeviceGray", 1, 0));
            let fm1 = doc.new_object_id();
            doc.objects.insert(
                fm1,
                Object::Stream(form(dictionary! { "Im1" => image, "Fm1" => fm1 })),
            );
            dictionary! { "Fm1" => fm1, "Im1" => image }
        });
        let seen = collect(&pdf);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].2, Ok((64, 64)));
    }

    #[test]
    fn cmyk_samples_decode_to_rgb() {
        let pdf = document_with_images(vec![raw_image(4, 4, "DeviceCMYK", 4, 0)]);
        let mut decoded = None;
        LopdfSource
            .scan(&pdf, &mut |img: &dyn EmbeddedImage| {
                decoded = Some(img.decode());
                ControlFlow::Break(())
            })
            .unwrap();
        let image = decoded.unwrap().unwrap();
        assert!(matches!(image, DynamicImage::ImageRgb8(_)));
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn jpx_is_unsupported_but_has_dimensions() {
        let mut jpx = raw_image(120, 90, "DeviceRGB", 3, 0);
        jpx.dict.set("Filter", "JPXDecode");
        let pdf = document_with_images(vec![jpx]);

        let mut result = None;
        LopdfSource
            .scan(&pdf, &mut |img: &dyn EmbeddedImage| {
                result = Some((img.dimensions(), img.decode()));
                ControlFlow::Continue(())
            })
            .unwrap();
        let (dims, decoded) = result.unwrap();
        assert_eq!(dims, Ok((120, 90)));
        assert!(matches!(decoded, Err(BackendError::UnsupportedEncoding { .. })));
    }

    #[test]
    fn truncated_samples_fail_only_that_image() {
        let mut short = raw_image(10, 10, "DeviceRGB", 3, 0);
        short.set_content(vec![0; 12]);
        let pdf = document_with_images(vec![short, raw_image(10, 10, "DeviceGray", 1, 9)]);
        let seen = collect(&pdf);
        assert!(!seen[0].3);
        assert!(seen[1].3);
    }

    #[test]
    fn break_stops_the_scan() {
        let pdf = document_with_images(vec![
            raw_image(60, 60, "DeviceGray", 1, 0),
            raw_image(60, 60, "DeviceGray", 1, 0),
        ]);
        let mut visits = 0;
        LopdfSource
            .scan(&pdf, &mut |_img: &dyn EmbeddedImage| {
                visits += 1;
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(visits, 1);
    }

    #[test]
    fn garbage_fails_to_open() {
        let err = LopdfSource
            .scan(b"not a pdf at all", &mut |_img: &dyn EmbeddedImage| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenFailed { backend: "lopdf", .. }));
    }

    #[test]
    fn device_space_names() {
        assert_eq!(device_space(b"DeviceCMYK"), Some(ColourSpace::Cmyk));
        assert_eq!(device_space(b"G"), Some(ColourSpace::Gray));
        assert_eq!(device_space(b"Pattern"), None);
    }
}
