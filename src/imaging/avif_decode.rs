//! AV1 payload decoding for AVIF files.
//!
//! The `image` crate's `"avif"` feature only enables the **encoder** (rav1e);
//! its decoder needs `"avif-native"` and the C library dav1d. Instead the
//! container is parsed with `avif-parse` and the AV1 payload decoded with
//! `rav1d`, the pure-Rust dav1d port, followed by a BT.601 YUV→RGB
//! conversion of the returned planes.

use crate::imaging::normalize::NormalizeError;
use image::{DynamicImage, RgbImage};
use std::io::Cursor;
use std::ptr::NonNull;

/// Decode an AVIF byte buffer (full container) into an RGB image.
pub fn decode(data: &[u8]) -> Result<DynamicImage, NormalizeError> {
    let avif = avif_parse::read_avif(&mut Cursor::new(data))
        .map_err(|e| NormalizeError::Decode(format!("AVIF container parse failed: {e:?}")))?;
    decode_av1(&avif.primary_item)
}

/// Decode a raw AV1 still through rav1d.
fn decode_av1(av1_bytes: &[u8]) -> Result<DynamicImage, NormalizeError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;

    let fail = |what: &str, code: i32| NormalizeError::Decode(format!("rav1d {what} ({code})"));

    // One still frame per AVIF: a single-threaded decoder with no frame
    // delay is all this ever needs.
    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap())
    };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(fail("open failed", rc.0));
    }

    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(NormalizeError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(fail("send_data failed", rc.0));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(fail("get_picture failed", rc.0));
    }

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;

    let luma = PlaneView {
        ptr: pic.data[0].unwrap().as_ptr() as *const u8,
        stride: pic.stride[0],
        bpc,
    };

    let rgb = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        planes_to_rgb(&luma, None, width, height)
    } else {
        let subsampling = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => Some((true, true)),
            DAV1D_PIXEL_LAYOUT_I422 => Some((true, false)),
            DAV1D_PIXEL_LAYOUT_I444 => Some((false, false)),
            _ => None,
        };
        let Some((ss_x, ss_y)) = subsampling else {
            unsafe {
                rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
                rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
            }
            return Err(NormalizeError::Decode(format!(
                "unsupported AVIF pixel layout: {layout}"
            )));
        };
        let chroma = ChromaView {
            cb: PlaneView {
                ptr: pic.data[1].unwrap().as_ptr() as *const u8,
                stride: pic.stride[1],
                bpc,
            },
            cr: PlaneView {
                ptr: pic.data[2].unwrap().as_ptr() as *const u8,
                stride: pic.stride[1],
                bpc,
            },
            ss_x,
            ss_y,
        };
        planes_to_rgb(&luma, Some(&chroma), width, height)
    };

    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| NormalizeError::Decode("decoded AVIF plane size mismatch".into()))
}

/// Borrowed view of one decoded plane. Valid only while the Dav1dPicture is
/// referenced.
struct PlaneView {
    ptr: *const u8,
    stride: isize,
    bpc: u32,
}

impl PlaneView {
    /// Read one sample as f32. 10/12-bit planes store u16 samples.
    #[inline]
    fn sample(&self, x: u32, y: u32) -> f32 {
        if self.bpc <= 8 {
            f32::from(unsafe { *self.ptr.offset(y as isize * self.stride + x as isize) })
        } else {
            let offset = y as isize * self.stride + x as isize * 2;
            f32::from(unsafe { *(self.ptr.offset(offset) as *const u16) })
        }
    }
}

struct ChromaView {
    cb: PlaneView,
    cr: PlaneView,
    /// Chroma subsampling: horizontal, vertical (I420 = both).
    ss_x: bool,
    ss_y: bool,
}

/// Convert decoded planes to interleaved RGB8 using BT.601 coefficients.
/// `chroma == None` means monochrome (I400).
fn planes_to_rgb(luma: &PlaneView, chroma: Option<&ChromaView>, width: u32, height: u32) -> Vec<u8> {
    let max_val = ((1u32 << luma.bpc) - 1) as f32;
    let center = (1u32 << (luma.bpc - 1)) as f32;
    let scale = 255.0 / max_val;

    let mut rgb = vec![0u8; (width * height * 3) as usize];

    for row in 0..height {
        for col in 0..width {
            let y = luma.sample(col, row);

            let (r, g, b) = match chroma {
                None => {
                    let v = (y * scale).clamp(0.0, 255.0);
                    (v, v, v)
                }
                Some(chroma) => {
                    let cx = if chroma.ss_x { col / 2 } else { col };
                    let cy = if chroma.ss_y { row / 2 } else { row };
                    let cb = chroma.cb.sample(cx, cy) - center;
                    let cr = chroma.cr.sample(cx, cy) - center;

                    (
                        ((y + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                }
            };

            let idx = ((row * width + col) * 3) as usize;
            rgb[idx] = r as u8;
            rgb[idx + 1] = g as u8;
            rgb[idx + 2] = b as u8;
        }
    }

    rgb
}
