//
// bmpflow - multithreaded BMP convolution/median filtering
// image.rs - the in-memory raster data model (C1/C4's shared payload)
//
// Copyright (c) 2018 Brion Vibber
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//

// Fixed overhead assumed per queued image: bmp_img struct size plus a small
// fudge factor, mirroring RAW_MEM_OVERHEAD from the reference implementation.
const RAW_MEM_OVERHEAD: usize = 128;

const POINTER_SIZE: usize = std::mem::size_of::<usize>();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub fn new(r: u8, g: u8, b: u8) -> Pixel {
        Pixel { r, g, b }
    }

    pub const BLACK: Pixel = Pixel { r: 0, g: 0, b: 0 };
}

/// A 24-bit top-left-origin raster: `height` rows of `width` RGB pixels,
/// stored as one contiguous `height * stride` byte buffer (stride = width*3).
///
/// A zero-sized image (`width == 0 && height == 0`) is the pipeline's
/// sentinel value (spec §3, "Sentinel image"); it carries no pixel data.
#[derive(Clone, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Image {
        let stride = Image::stride_for(width);
        let data = vec![0u8; stride * height as usize];
        Image { width, height, data }
    }

    /// The zero-sized sentinel used to wake and terminate a pipeline consumer.
    pub fn sentinel() -> Image {
        Image { width: 0, height: 0, data: Vec::new() }
    }

    pub fn is_sentinel(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        Image::stride_for(self.width)
    }

    fn stride_for(width: u32) -> usize {
        width as usize * 3
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        let idx = self.offset(x, y);
        Pixel {
            r: self.data[idx],
            g: self.data[idx + 1],
            b: self.data[idx + 2],
        }
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, p: Pixel) {
        let idx = self.offset(x, y);
        self.data[idx] = p.r;
        self.data[idx + 1] = p.g;
        self.data[idx + 2] = p.b;
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y as usize * self.stride() + x as usize * 3
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Estimated live memory footprint, per spec §3/§4.4:
    /// `W*H*bytes_per_pixel + H*pointer_size + sizeof(header) + small_overhead`.
    pub fn estimate_bytes(&self) -> usize {
        let pixel_bytes = self.width as usize * self.height as usize * 3;
        let row_pointer_allowance = self.height as usize * POINTER_SIZE;
        pixel_bytes + row_pointer_allowance + std::mem::size_of::<Image>() + RAW_MEM_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_black() {
        let img = Image::new(4, 3);
        assert_eq!(img.width(), 4);
        assert_eq!(img.height(), 3);
        assert_eq!(img.get_pixel(0, 0), Pixel::BLACK);
        assert_eq!(img.get_pixel(3, 2), Pixel::BLACK);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut img = Image::new(2, 2);
        img.set_pixel(1, 0, Pixel::new(10, 20, 30));
        assert_eq!(img.get_pixel(1, 0), Pixel::new(10, 20, 30));
        assert_eq!(img.get_pixel(0, 0), Pixel::BLACK);
    }

    #[test]
    fn sentinel_has_no_data() {
        let s = Image::sentinel();
        assert!(s.is_sentinel());
        assert_eq!(s.as_bytes().len(), 0);
    }

    #[test]
    fn estimate_grows_with_area() {
        let small = Image::new(4, 4);
        let big = Image::new(40, 40);
        assert!(big.estimate_bytes() > small.estimate_bytes() * 10);
    }
}
