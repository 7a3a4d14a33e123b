// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Text and affine background rendering, one 240-wide line at a time.

use gbacore_core::MemBlock;

use super::tile;

fn char_base(cnt: u32) -> usize {
    ((cnt >> 2) & 0x3) as usize * 0x4000
}

fn screen_base(cnt: u32) -> usize {
    ((cnt >> 8) & 0x1f) as usize * 0x800
}

fn is_8bpp(cnt: u32) -> bool {
    cnt & (1 << 7) != 0
}

pub fn mosaic_enabled(cnt: u32) -> bool {
    cnt & (1 << 6) != 0
}

pub fn priority(cnt: u32) -> u8 {
    (cnt & 0x3) as u8
}

fn text_size(cnt: u32) -> (u32, u32) {
    match (cnt >> 14) & 0x3 {
        0 => (256, 256),
        1 => (512, 256),
        2 => (256, 512),
        _ => (512, 512),
    }
}

fn affine_size(cnt: u32) -> u32 {
    128 << ((cnt >> 14) & 0x3)
}

fn affine_wraparound(cnt: u32) -> bool {
    cnt & (1 << 13) != 0
}

/// Sign-extends a BG2X/BG2Y/BG3X/BG3Y reference point: 28 significant bits,
/// 8 of them fractional.
pub fn sign_extend28(value: u32) -> i32 {
    ((value << 4) as i32) >> 4
}

/// Renders one line of a text-mode background (modes 0, and BG0/BG1 in
/// mode 1) into `out`, indexed by screen column. `mosaic_x` is the raw
/// MOSAIC.BGH field value (0 disables snapping).
pub fn render_text_line(
    cnt: u32,
    hofs: u32,
    vofs: u32,
    line: u32,
    mosaic_x: u32,
    vram: &MemBlock,
    palette: &MemBlock,
    out: &mut [Option<u16>; 240],
) {
    let (width, height) = text_size(cnt);
    let char_base_addr = char_base(cnt);
    let screen_base_addr = screen_base(cnt);
    let eight_bpp = is_8bpp(cnt);

    let map_y = vofs.wrapping_add(line) % height;
    let tile_row = map_y / 8;
    let in_tile_y = map_y % 8;

    for x in 0..240u32 {
        let sample_x = if mosaic_x > 0 { x - x % (mosaic_x + 1) } else { x };
        let map_x = hofs.wrapping_add(sample_x) % width;
        let tile_col = map_x / 8;
        let in_tile_x = map_x % 8;

        let block_x = tile_col / 32;
        let block_y = tile_row / 32;
        let block = if width == 512 && height == 512 {
            block_y * 2 + block_x
        } else {
            block_x + block_y
        };
        let local_col = tile_col % 32;
        let local_row = tile_row % 32;

        let entry_addr = screen_base_addr + block as usize * 0x800 + (local_row * 32 + local_col) as usize * 2;
        let entry = u32::from(vram.read16(entry_addr));
        let tile_number = entry & 0x3ff;
        let hflip = entry & (1 << 10) != 0;
        let vflip = entry & (1 << 11) != 0;
        let pal_bank = (entry >> 12) & 0xf;

        let px = if hflip { 7 - in_tile_x } else { in_tile_x };
        let py = if vflip { 7 - in_tile_y } else { in_tile_y };

        out[x as usize] = if eight_bpp {
            tile::sample_8bpp(vram, char_base_addr, tile_number, px, py).map(|idx| tile::bg_palette_color(palette, idx))
        } else {
            tile::sample_4bpp(vram, char_base_addr, tile_number, px, py, pal_bank)
                .map(|idx| tile::bg_palette_color(palette, idx))
        };
    }
}

/// Renders one line of an affine background (BG2 in modes 1/2, BG3 in
/// mode 2) by sampling through the per-line-advancing reference point.
/// `ref_x`/`ref_y` are the internal reference point for this line (already
/// advanced by PB/PD from the previous line), in 20.8 fixed point.
pub fn render_affine_line(
    cnt: u32,
    ref_x: i32,
    ref_y: i32,
    pa: i16,
    pc: i16,
    mosaic_x: u32,
    vram: &MemBlock,
    palette: &MemBlock,
    out: &mut [Option<u16>; 240],
) {
    let size = affine_size(cnt) as i32;
    let wraparound = affine_wraparound(cnt);
    let char_base_addr = char_base(cnt);
    let screen_base_addr = screen_base(cnt);
    let map_tiles = (size / 8) as u32;

    for x in 0..240u32 {
        let sx = if mosaic_x > 0 { x - x % (mosaic_x + 1) } else { x };
        let tex_x = ref_x + pa as i32 * sx as i32;
        let tex_y = ref_y + pc as i32 * sx as i32;
        let mut px = tex_x >> 8;
        let mut py = tex_y >> 8;

        if px < 0 || py < 0 || px >= size || py >= size {
            if wraparound {
                px = px.rem_euclid(size);
                py = py.rem_euclid(size);
            } else {
                out[x as usize] = None;
                continue;
            }
        }

        let tile_col = px as u32 / 8;
        let tile_row = py as u32 / 8;
        let in_tile_x = px as u32 % 8;
        let in_tile_y = py as u32 % 8;

        let entry_addr = screen_base_addr + (tile_row * map_tiles + tile_col) as usize;
        let tile_number = u32::from(vram.read8(entry_addr));

        out[x as usize] =
            tile::sample_8bpp(vram, char_base_addr, tile_number, in_tile_x, in_tile_y).map(|idx| tile::bg_palette_color(palette, idx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extend28_handles_negative_reference_point() {
        assert_eq!(-1, sign_extend28(0x0fff_ffff_u32 | 0xf000_0000));
        assert_eq!(1, sign_extend28(1));
    }

    #[test]
    fn text_size_decodes_all_four_screen_sizes() {
        assert_eq!((256, 256), text_size(0));
        assert_eq!((512, 256), text_size(1 << 14));
        assert_eq!((256, 512), text_size(2 << 14));
        assert_eq!((512, 512), text_size(3 << 14));
    }

    #[test]
    fn render_text_line_samples_first_tile_of_screen_block() {
        let mut vram = MemBlock::new(0x1_8000, false);
        // Screen entry 0 at the BG's screen base points at tile 1.
        vram.write16(0, 1);
        // Tile 1 (4bpp, 32 bytes/tile) is solid palette index 1, bank 0.
        for i in 0..32 {
            vram.write8(32 + i, 0x11);
        }
        let palette = MemBlock::new(0x400, false);
        let mut out = [None; 240];
        render_text_line(0, 0, 0, 0, 0, &vram, &palette, &mut out);
        assert_eq!(Some(tile::bg_palette_color(&palette, 1)), out[0]);
    }
}
