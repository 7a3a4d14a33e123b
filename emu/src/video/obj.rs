// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Sprite rendering: decodes all 128 OAM entries for the current line and
//! writes into the OBJ color/info line buffers and the OBJ window mask.

use gbacore_core::MemBlock;

use super::tile;

const OAM_ENTRIES: u32 = 128;
const OBJ_TILE_BASE: usize = 0x1_0000;

/// Per-pixel metadata the compositor needs alongside the OBJ color buffer.
#[derive(Clone, Copy, Default)]
pub struct ObjPixel {
    pub priority: u8,
    pub semi_transparent: bool,
}

fn obj_dimensions(shape: u32, size: u32) -> (u32, u32) {
    match (shape, size) {
        (0, 0) => (8, 8),
        (0, 1) => (16, 16),
        (0, 2) => (32, 32),
        (0, 3) => (64, 64),
        (1, 0) => (16, 8),
        (1, 1) => (32, 8),
        (1, 2) => (32, 16),
        (1, 3) => (64, 32),
        (2, 0) => (8, 16),
        (2, 1) => (8, 32),
        (2, 2) => (16, 32),
        (2, 3) => (32, 64),
        _ => (8, 8),
    }
}

fn affine_param(oam: &MemBlock, group: u32, slot: u32) -> i16 {
    let entry = group * 4 + slot;
    oam.read16(entry as usize * 8 + 6) as i16
}

/// Renders one line of sprites (reverse OAM order so lower indices win
/// ties) into `obj_color`/`obj_info` and marks `obj_window` for OBJ-mode-2
/// entries, which contribute only to the window mask, not to the display.
pub fn render_obj_line(
    oam: &MemBlock,
    vram: &MemBlock,
    palette: &MemBlock,
    line: u32,
    mosaic_h: u32,
    mosaic_v: u32,
    one_d_mapping: bool,
    obj_color: &mut [Option<u16>; 240],
    obj_info: &mut [ObjPixel; 240],
    obj_window: &mut [bool; 240],
) {
    for entry in (0..OAM_ENTRIES).rev() {
        let base = entry as usize * 8;
        let attr0 = u32::from(oam.read16(base));
        let attr1 = u32::from(oam.read16(base + 2));
        let attr2 = u32::from(oam.read16(base + 4));

        let affine = attr0 & (1 << 8) != 0;
        let double_size_or_disable = attr0 & (1 << 9) != 0;
        if !affine && double_size_or_disable {
            continue; // disabled
        }
        let mode = (attr0 >> 10) & 0x3;
        if mode == 3 {
            continue; // prohibited
        }
        let mosaic = attr0 & (1 << 12) != 0;
        let eight_bpp = attr0 & (1 << 13) != 0;
        let shape = (attr0 >> 14) & 0x3;
        let y = attr0 & 0xff;

        let size = (attr1 >> 14) & 0x3;
        let (width, height) = obj_dimensions(shape, size);
        let double_size = affine && double_size_or_disable;
        let (bound_w, bound_h) = if double_size { (width * 2, height * 2) } else { (width, height) };

        let y_signed = if y + bound_h > 256 { y as i32 - 256 } else { y as i32 };
        if (line as i32) < y_signed || (line as i32) >= y_signed + bound_h as i32 {
            continue;
        }

        let x = attr1 & 0x1ff;
        let x_signed = if x + bound_w > 512 { x as i32 - 512 } else { x as i32 };

        let tile_number = attr2 & 0x3ff;
        let prio = ((attr2 >> 10) & 0x3) as u8;
        let palette_bank = (attr2 >> 12) & 0xf;

        let (pa, pb, pc, pd) = if affine {
            let group = (attr1 >> 9) & 0x1f;
            (
                affine_param(oam, group, 0),
                affine_param(oam, group, 1),
                affine_param(oam, group, 2),
                affine_param(oam, group, 3),
            )
        } else {
            (1 << 8, 0, 0, 1 << 8)
        };
        let hflip = !affine && attr1 & (1 << 12) != 0;
        let vflip = !affine && attr1 & (1 << 13) != 0;

        let dy = line as i32 - y_signed;
        let tiles_per_row_4bpp = width / 8;
        let tiles_per_row_8bpp = width / 8;

        for sx in 0..bound_w as i32 {
            let screen_x = x_signed + sx;
            if screen_x < 0 || screen_x >= 240 {
                continue;
            }

            let (tex_x, tex_y) = if affine {
                let cx = bound_w as i32 / 2;
                let cy = bound_h as i32 / 2;
                let rel_x = sx - cx;
                let rel_y = dy - cy;
                let tx = ((width as i32 / 2) << 8) + pa as i32 * rel_x + pb as i32 * rel_y;
                let ty = ((height as i32 / 2) << 8) + pc as i32 * rel_x + pd as i32 * rel_y;
                (tx >> 8, ty >> 8)
            } else {
                let mut tx = sx;
                let mut ty = dy;
                if mosaic && mosaic_h > 0 {
                    tx -= tx.rem_euclid((mosaic_h + 1) as i32);
                }
                if mosaic && mosaic_v > 0 {
                    ty -= ty.rem_euclid((mosaic_v + 1) as i32);
                }
                if hflip {
                    tx = width as i32 - 1 - tx;
                }
                if vflip {
                    ty = height as i32 - 1 - ty;
                }
                (tx, ty)
            };

            if tex_x < 0 || tex_y < 0 || tex_x >= width as i32 || tex_y >= height as i32 {
                continue;
            }
            let (tex_x, tex_y) = (tex_x as u32, tex_y as u32);
            let tile_col = tex_x / 8;
            let tile_row = tex_y / 8;
            let in_tile_x = tex_x % 8;
            let in_tile_y = tex_y % 8;

            let color = if eight_bpp {
                let tile_index = if one_d_mapping {
                    tile_number + (tile_row * tiles_per_row_8bpp) * 2 + tile_col * 2
                } else {
                    tile_number + tile_row * 32 + tile_col * 2
                };
                tile::sample_8bpp(vram, OBJ_TILE_BASE, tile_index, in_tile_x, in_tile_y).map(|idx| tile::obj_palette_color(palette, idx))
            } else {
                let tile_index = if one_d_mapping {
                    tile_number + tile_row * tiles_per_row_4bpp + tile_col
                } else {
                    tile_number + tile_row * 32 + tile_col
                };
                tile::sample_4bpp(vram, OBJ_TILE_BASE, tile_index, in_tile_x, in_tile_y, palette_bank)
                    .map(|idx| tile::obj_palette_color(palette, idx))
            };

            let color = match color {
                Some(color) => color,
                None => continue,
            };

            if mode == 2 {
                obj_window[screen_x as usize] = true;
                continue;
            }

            let slot = &mut obj_info[screen_x as usize];
            let is_opaque_already = obj_color[screen_x as usize].is_some();
            if !is_opaque_already || prio <= slot.priority {
                obj_color[screen_x as usize] = Some(color);
                slot.priority = prio;
                slot.semi_transparent = mode == 1;
            }
        }
    }
}
