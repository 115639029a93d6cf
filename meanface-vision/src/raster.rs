use image::{DynamicImage, RgbImage};
use ndarray::{s, Array3, ArrayView1};

use crate::geometry::Rect;

/// Float RGB raster shaped `(height, width, 3)` with intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub data: Array3<f32>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Array3::zeros((height as usize, width as usize, 3)),
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [f32; 3]) -> Self {
        let data = Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            f(x as u32, y as u32)[c]
        });
        Self { data }
    }

    /// Decode an 8-bit image into `[0, 1]` floats.
    pub fn from_image(img: &DynamicImage) -> Self {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let raw = rgb.as_raw();
        let data = Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
            raw[(y * width as usize + x) * 3 + c] as f32 / 255.0
        });
        Self { data }
    }

    /// Rescale to 8-bit, clamping out-of-range intensities.
    pub fn to_rgb8(&self) -> RgbImage {
        let (w, h) = (self.width(), self.height());
        RgbImage::from_fn(w, h, |x, y| {
            let px = self.pixel(x as usize, y as usize);
            image::Rgb([quantize(px[0]), quantize(px[1]), quantize(px[2])])
        })
    }

    pub fn width(&self) -> u32 {
        self.data.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.data.dim().0 as u32
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> ArrayView1<'_, f32> {
        self.data.slice(s![y, x, ..])
    }

    #[inline]
    pub fn put_pixel(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        for (c, v) in rgb.into_iter().enumerate() {
            self.data[[y, x, c]] = v;
        }
    }

    pub fn full_rect(&self) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width: self.width() as i64,
            height: self.height() as i64,
        }
    }

    /// Bilinear sample at `(x, y)` restricted to `region`, reflecting (without repeating
    /// the edge pixel) at the region's borders.
    ///
    /// Coordinates are relative to `region`'s top-left corner. `region` must lie inside
    /// the canvas and be non-empty.
    pub fn sample_bilinear(&self, region: Rect, x: f64, y: f64) -> [f32; 3] {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = (x - x0) as f32;
        let fy = (y - y0) as f32;
        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let cx0 = (region.x + reflect101(x0, region.width)) as usize;
        let cx1 = (region.x + reflect101(x0 + 1, region.width)) as usize;
        let cy0 = (region.y + reflect101(y0, region.height)) as usize;
        let cy1 = (region.y + reflect101(y0 + 1, region.height)) as usize;

        let w00 = (1.0 - fx) * (1.0 - fy);
        let w10 = fx * (1.0 - fy);
        let w01 = (1.0 - fx) * fy;
        let w11 = fx * fy;

        let mut out = [0.0f32; 3];
        for (c, v) in out.iter_mut().enumerate() {
            *v = self.data[[cy0, cx0, c]] * w00
                + self.data[[cy0, cx1, c]] * w10
                + self.data[[cy1, cx0, c]] * w01
                + self.data[[cy1, cx1, c]] * w11;
        }
        out
    }
}

/// Reflect an index into `[0, len)` as `... 2 1 | 0 1 2 ... len-1 | len-2 ...`.
pub fn reflect101(i: i64, len: i64) -> i64 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let r = i.rem_euclid(period);
    if r < len {
        r
    } else {
        period - r
    }
}

fn quantize(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}
