// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Window masking and the priority-ordered two-layer compositor that turns
//! four BG line buffers and the OBJ line buffer into final 15-bit colors.

use super::obj::ObjPixel;

/// Per-pixel enable mask: BG0, BG1, BG2, BG3, OBJ, effect-enable.
#[derive(Clone, Copy)]
pub struct LayerEnable {
    pub bg: [bool; 4],
    pub obj: bool,
    pub effect: bool,
}

const ALL_ENABLED: LayerEnable = LayerEnable { bg: [true; 4], obj: true, effect: true };

pub struct WindowConfig {
    pub win0_enabled: bool,
    pub win1_enabled: bool,
    pub objwin_enabled: bool,
    pub win0_x1: u32,
    pub win0_x2: u32,
    pub win0_y1: u32,
    pub win0_y2: u32,
    pub win1_x1: u32,
    pub win1_x2: u32,
    pub win1_y1: u32,
    pub win1_y2: u32,
    pub win0_layers: LayerEnable,
    pub win1_layers: LayerEnable,
    pub outside_layers: LayerEnable,
    pub objwin_layers: LayerEnable,
}

fn in_range(v: u32, lo: u32, hi: u32) -> bool {
    if lo <= hi {
        v >= lo && v < hi
    } else {
        v >= lo || v < hi
    }
}

fn layer_enable_for_column(cfg: &WindowConfig, x: u32, line: u32, obj_window: bool) -> LayerEnable {
    if !cfg.win0_enabled && !cfg.win1_enabled && !cfg.objwin_enabled {
        return ALL_ENABLED;
    }
    if cfg.win0_enabled && in_range(x, cfg.win0_x1, cfg.win0_x2) && in_range(line, cfg.win0_y1, cfg.win0_y2) {
        return cfg.win0_layers;
    }
    if cfg.win1_enabled && in_range(x, cfg.win1_x1, cfg.win1_x2) && in_range(line, cfg.win1_y1, cfg.win1_y2) {
        return cfg.win1_layers;
    }
    if cfg.objwin_enabled && obj_window {
        return cfg.objwin_layers;
    }
    cfg.outside_layers
}

fn channel(color: u16, shift: u32) -> i32 {
    ((color >> shift) & 0x1f) as i32
}

fn pack(r: i32, g: i32, b: i32) -> u16 {
    (r.clamp(0, 31) as u16) | ((g.clamp(0, 31) as u16) << 5) | ((b.clamp(0, 31) as u16) << 10)
}

fn blend_alpha(top: u16, bottom: u16, eva: i32, evb: i32) -> u16 {
    let r = (channel(top, 0) * eva + channel(bottom, 0) * evb) / 16;
    let g = (channel(top, 5) * eva + channel(bottom, 5) * evb) / 16;
    let b = (channel(top, 10) * eva + channel(bottom, 10) * evb) / 16;
    pack(r, g, b)
}

fn blend_brighten(color: u16, evy: i32) -> u16 {
    let r = channel(color, 0) + (31 - channel(color, 0)) * evy / 16;
    let g = channel(color, 5) + (31 - channel(color, 5)) * evy / 16;
    let b = channel(color, 10) + (31 - channel(color, 10)) * evy / 16;
    pack(r, g, b)
}

fn blend_darken(color: u16, evy: i32) -> u16 {
    let r = channel(color, 0) - channel(color, 0) * evy / 16;
    let g = channel(color, 5) - channel(color, 5) * evy / 16;
    let b = channel(color, 10) - channel(color, 10) * evy / 16;
    pack(r, g, b)
}

fn layer_bit(layer: u8) -> u32 {
    1 << layer
}

/// Renders one composited line from the four BG buffers, the OBJ buffer and
/// the backdrop color, honoring per-pixel window masking and BLDCNT/BLDALPHA/
/// BLDY color effects.
#[allow(clippy::too_many_arguments)]
pub fn compose_line(
    line: u32,
    bg_colors: &[[Option<u16>; 240]; 4],
    bg_priority: [u8; 4],
    bg_enabled: [bool; 4],
    obj_color: &[Option<u16>; 240],
    obj_info: &[ObjPixel; 240],
    obj_enabled: bool,
    obj_window: &[bool; 240],
    window: &WindowConfig,
    bldcnt: u32,
    bldalpha: u32,
    bldy: u32,
    backdrop: u16,
    out: &mut [u16; 240],
) {
    let effect_mode = (bldcnt >> 6) & 0x3;
    let target1_mask = bldcnt & 0x3f;
    let target2_mask = (bldcnt >> 8) & 0x3f;
    let eva = (bldalpha & 0x1f).min(16) as i32;
    let evb = ((bldalpha >> 8) & 0x1f).min(16) as i32;
    let evy = (bldy & 0x1f).min(16) as i32;

    for x in 0..240usize {
        let layers = layer_enable_for_column(window, x as u32, line, obj_window[x]);

        // (priority, tie-break rank, layer id 0-3=BG 4=OBJ 5=backdrop, color)
        let mut candidates: Vec<(u8, u8, u8, u16)> = Vec::with_capacity(6);
        for bg in 0..4 {
            if bg_enabled[bg] && layers.bg[bg] {
                if let Some(color) = bg_colors[bg][x] {
                    candidates.push((bg_priority[bg], bg as u8 + 1, bg as u8, color));
                }
            }
        }
        if obj_enabled && layers.obj {
            if let Some(color) = obj_color[x] {
                candidates.push((obj_info[x].priority, 0, 4, color));
            }
        }
        candidates.push((u8::MAX, 5, 5, backdrop));
        candidates.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let top = candidates[0];
        let second = candidates[1];
        let top_layer = top.2;
        let second_layer = second.2;

        let forced_alpha = top_layer == 4 && obj_info[x].semi_transparent && target2_mask & layer_bit(second_layer) != 0;

        let mut color = top.3;
        if layers.effect {
            if forced_alpha {
                color = blend_alpha(top.3, second.3, eva, evb);
            } else if effect_mode != 0 && target1_mask & layer_bit(top_layer) != 0 {
                color = match effect_mode {
                    1 if target2_mask & layer_bit(second_layer) != 0 => blend_alpha(top.3, second.3, eva, evb),
                    2 => blend_brighten(top.3, evy),
                    3 => blend_darken(top.3, evy),
                    _ => color,
                };
            }
        }
        out[x] = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_window() -> WindowConfig {
        WindowConfig {
            win0_enabled: false,
            win1_enabled: false,
            objwin_enabled: false,
            win0_x1: 0,
            win0_x2: 0,
            win0_y1: 0,
            win0_y2: 0,
            win1_x1: 0,
            win1_x2: 0,
            win1_y1: 0,
            win1_y2: 0,
            win0_layers: ALL_ENABLED,
            win1_layers: ALL_ENABLED,
            outside_layers: ALL_ENABLED,
            objwin_layers: ALL_ENABLED,
        }
    }

    #[test]
    fn backdrop_shows_through_when_no_layer_opaque() {
        let bg_colors: [[Option<u16>; 240]; 4] = Default::default();
        let obj_color: [Option<u16>; 240] = [None; 240];
        let obj_info = [ObjPixel::default(); 240];
        let obj_window = [false; 240];
        let mut out = [0u16; 240];
        compose_line(
            0,
            &bg_colors,
            [0; 4],
            [true; 4],
            &obj_color,
            &obj_info,
            true,
            &obj_window,
            &empty_window(),
            0,
            0,
            0,
            0x7fff,
            &mut out,
        );
        assert_eq!(0x7fff, out[0]);
    }

    #[test]
    fn lower_priority_number_bg_wins_over_higher() {
        let mut bg_colors: [[Option<u16>; 240]; 4] = Default::default();
        bg_colors[0][0] = Some(0x1);
        bg_colors[1][0] = Some(0x2);
        let obj_color: [Option<u16>; 240] = [None; 240];
        let obj_info = [ObjPixel::default(); 240];
        let obj_window = [false; 240];
        let mut out = [0u16; 240];
        compose_line(
            0,
            &bg_colors,
            [0, 1, 2, 3],
            [true; 4],
            &obj_color,
            &obj_info,
            true,
            &obj_window,
            &empty_window(),
            0,
            0,
            0,
            0,
            &mut out,
        );
        assert_eq!(0x1, out[0]);
    }

    #[test]
    fn window_outside_can_disable_a_layer() {
        let mut bg_colors: [[Option<u16>; 240]; 4] = Default::default();
        bg_colors[0][0] = Some(0x5);
        let obj_color: [Option<u16>; 240] = [None; 240];
        let obj_info = [ObjPixel::default(); 240];
        let obj_window = [false; 240];
        let mut window = empty_window();
        window.win0_enabled = true;
        window.win0_x2 = 0; // column 0 is outside win0
        window.win0_y2 = 160;
        window.outside_layers = LayerEnable { bg: [false, true, true, true], obj: true, effect: true };
        let mut out = [0u16; 240];
        compose_line(
            0,
            &bg_colors,
            [0; 4],
            [true; 4],
            &obj_color,
            &obj_info,
            true,
            &obj_window,
            &window,
            0,
            0,
            0,
            0x1234,
            &mut out,
        );
        assert_eq!(0x1234, out[0]);
    }
}
