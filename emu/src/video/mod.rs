// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The display pipeline: DISPCNT/DISPSTAT/VCOUNT timing at 308 dots by 228
//! lines, 4 cycles per dot, with a double-buffered frame handed to the host
//! once per vertical blank.
//!
//! The frame is rendered in one pass at VBlank entry rather than dot-by-dot,
//! but every mode walks the same six 240-wide line buffers (four BG, OBJ
//! color, OBJ info) one scanline at a time: modes 0-2 fill BG buffers from
//! tile/affine maps, modes 3-5 fill BG2's buffer from a VRAM bitmap, and
//! every mode runs OBJ, window and color-effect compositing over the result.

mod bg;
mod compose;
mod obj;
mod tile;

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, MemBlock, Slot, SlotStorage};

use crate::irq::{Irq, IrqSource};
use compose::{compose_line, LayerEnable, WindowConfig};
use obj::ObjPixel;

pub const SCREEN_WIDTH: usize = 240;
pub const SCREEN_HEIGHT: usize = 160;
const DOTS_PER_LINE: u32 = 308;
const CYCLES_PER_DOT: u32 = 4;
const LINE_CYCLES: u32 = DOTS_PER_LINE * CYCLES_PER_DOT;
const HDRAW_DOTS: u32 = 240;
const TOTAL_LINES: u32 = 228;
const VISIBLE_LINES: u32 = 160;

const DISPCNT_ADDR: u32 = 0x0000;
const DISPSTAT_ADDR: u32 = 0x0004;
const VCOUNT_ADDR: u32 = 0x0006;

const BG_CNT_ADDR: [u32; 4] = [0x0008, 0x000a, 0x000c, 0x000e];
const BG_HOFS_ADDR: [u32; 4] = [0x0010, 0x0014, 0x0018, 0x001c];
const BG_VOFS_ADDR: [u32; 4] = [0x0012, 0x0016, 0x001a, 0x001e];
const BG_CNT_MASK: u32 = 0xffcf;
const BG_OFS_MASK: u32 = 0x01ff;

const BG2_AFFINE_BASE: u32 = 0x0020;
const BG3_AFFINE_BASE: u32 = 0x0030;

const WIN0H_ADDR: u32 = 0x0040;
const WIN1H_ADDR: u32 = 0x0042;
const WIN0V_ADDR: u32 = 0x0044;
const WIN1V_ADDR: u32 = 0x0046;
const WININ_ADDR: u32 = 0x0048;
const WINOUT_ADDR: u32 = 0x004a;
const MOSAIC_ADDR: u32 = 0x004c;
const BLDCNT_ADDR: u32 = 0x0050;
const BLDALPHA_ADDR: u32 = 0x0052;
const BLDY_ADDR: u32 = 0x0054;

/// One background's CNT/HOFS/VOFS registers, shared between the text and
/// affine renderers since BG2/BG3's CNT decides which one applies.
struct BgRegs {
    cnt: SharedCell<u32>,
    hofs: SharedCell<u32>,
    vofs: SharedCell<u32>,
}

impl BgRegs {
    fn new(io: &mut IoRegs, index: usize) -> Self {
        let cnt = slot_cell(0);
        let hofs = slot_cell(0);
        let vofs = slot_cell(0);
        let cnt_addr = BG_CNT_ADDR[index];
        io.add_slot(cnt_addr, Slot::new(SlotStorage::Cell(cnt.clone()), BG_CNT_MASK, (cnt_addr & 2) * 8));
        let hofs_addr = BG_HOFS_ADDR[index];
        io.add_slot(hofs_addr, Slot::new(SlotStorage::Cell(hofs.clone()), BG_OFS_MASK, (hofs_addr & 2) * 8));
        let vofs_addr = BG_VOFS_ADDR[index];
        io.add_slot(vofs_addr, Slot::new(SlotStorage::Cell(vofs.clone()), BG_OFS_MASK, (vofs_addr & 2) * 8));
        Self { cnt, hofs, vofs }
    }
}

/// An affine background's parameter matrix and internal reference point.
/// `ref_x`/`ref_y` are the live, per-line-advancing accumulators; `x_lo`/
/// `x_hi`/`y_lo`/`y_hi` are the external write-only latch registers. Any
/// write to those four re-arms `relatch`, which the renderer consumes to
/// snap the accumulator back to the latch immediately; VBlank end does the
/// same unconditionally via `reload`.
struct AffineRegs {
    pa: SharedCell<u32>,
    pb: SharedCell<u32>,
    pc: SharedCell<u32>,
    pd: SharedCell<u32>,
    x_lo: SharedCell<u32>,
    x_hi: SharedCell<u32>,
    y_lo: SharedCell<u32>,
    y_hi: SharedCell<u32>,
    relatch: SharedCell<u32>,
    ref_x: i32,
    ref_y: i32,
}

impl AffineRegs {
    fn new(io: &mut IoRegs, base: u32) -> Self {
        let pa = slot_cell(0);
        let pb = slot_cell(0);
        let pc = slot_cell(0);
        let pd = slot_cell(0);
        let x_lo = slot_cell(0);
        let x_hi = slot_cell(0);
        let y_lo = slot_cell(0);
        let y_hi = slot_cell(0);
        let relatch = slot_cell(0);

        io.add_slot(base, Slot::new(SlotStorage::Cell(pa.clone()), 0xffff, 0));
        io.add_slot(base + 2, Slot::new(SlotStorage::Cell(pb.clone()), 0xffff, 16));
        io.add_slot(base + 4, Slot::new(SlotStorage::Cell(pc.clone()), 0xffff, 0));
        io.add_slot(base + 6, Slot::new(SlotStorage::Cell(pd.clone()), 0xffff, 16));

        let relatch_on_x_lo = relatch.clone();
        io.add_slot(
            base + 8,
            Slot::new(SlotStorage::Cell(x_lo.clone()), 0xffff, 0).on_post_write(move |_old, _new| relatch_on_x_lo.set(1)),
        );
        let relatch_on_x_hi = relatch.clone();
        io.add_slot(
            base + 10,
            Slot::new(SlotStorage::Cell(x_hi.clone()), 0x0fff, 16).on_post_write(move |_old, _new| relatch_on_x_hi.set(1)),
        );
        let relatch_on_y_lo = relatch.clone();
        io.add_slot(
            base + 12,
            Slot::new(SlotStorage::Cell(y_lo.clone()), 0xffff, 0).on_post_write(move |_old, _new| relatch_on_y_lo.set(1)),
        );
        let relatch_on_y_hi = relatch.clone();
        io.add_slot(
            base + 14,
            Slot::new(SlotStorage::Cell(y_hi.clone()), 0x0fff, 16).on_post_write(move |_old, _new| relatch_on_y_hi.set(1)),
        );

        Self {
            pa,
            pb,
            pc,
            pd,
            x_lo,
            x_hi,
            y_lo,
            y_hi,
            relatch,
            ref_x: 0,
            ref_y: 0,
        }
    }

    fn pa(&self) -> i16 {
        self.pa.get() as i16
    }

    fn pc(&self) -> i16 {
        self.pc.get() as i16
    }

    fn external_x(&self) -> i32 {
        bg::sign_extend28(self.x_lo.get() | (self.x_hi.get() << 16))
    }

    fn external_y(&self) -> i32 {
        bg::sign_extend28(self.y_lo.get() | (self.y_hi.get() << 16))
    }

    fn reload(&mut self) {
        self.ref_x = self.external_x();
        self.ref_y = self.external_y();
        self.relatch.set(0);
    }

    fn maybe_relatch(&mut self) {
        if self.relatch.get() != 0 {
            self.reload();
        }
    }

    fn advance_line(&mut self) {
        self.ref_x += self.pb.get() as i16 as i32;
        self.ref_y += self.pd.get() as i16 as i32;
    }
}

struct WindowRegs {
    win0h: SharedCell<u32>,
    win1h: SharedCell<u32>,
    win0v: SharedCell<u32>,
    win1v: SharedCell<u32>,
    winin: SharedCell<u32>,
    winout: SharedCell<u32>,
}

impl WindowRegs {
    fn new(io: &mut IoRegs) -> Self {
        let win0h = slot_cell(0);
        let win1h = slot_cell(0);
        let win0v = slot_cell(0);
        let win1v = slot_cell(0);
        let winin = slot_cell(0);
        let winout = slot_cell(0);

        io.add_slot(WIN0H_ADDR, Slot::new(SlotStorage::Cell(win0h.clone()), 0xffff, 0));
        io.add_slot(WIN1H_ADDR, Slot::new(SlotStorage::Cell(win1h.clone()), 0xffff, 16));
        io.add_slot(WIN0V_ADDR, Slot::new(SlotStorage::Cell(win0v.clone()), 0xffff, 0));
        io.add_slot(WIN1V_ADDR, Slot::new(SlotStorage::Cell(win1v.clone()), 0xffff, 16));
        io.add_slot(WININ_ADDR, Slot::new(SlotStorage::Cell(winin.clone()), 0x3f3f, 0));
        io.add_slot(WINOUT_ADDR, Slot::new(SlotStorage::Cell(winout.clone()), 0x3f3f, 16));

        Self {
            win0h,
            win1h,
            win0v,
            win1v,
            winin,
            winout,
        }
    }
}

fn layer_enable(bits: u32) -> LayerEnable {
    LayerEnable {
        bg: [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0],
        obj: bits & 0x10 != 0,
        effect: bits & 0x20 != 0,
    }
}

/// Which kind of line buffer an active background fills this frame,
/// decided once per frame from DISPCNT's mode bits.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BgKind {
    None,
    Text,
    Affine,
    Bitmap3,
    Bitmap4,
    Bitmap5,
}

/// Display timing, mode decode and frame buffering (component J).
pub struct Video {
    dispcnt: SharedCell<u32>,
    dispstat: SharedCell<u32>,
    vcount: SharedCell<u32>,
    bg: [BgRegs; 4],
    bg2_affine: AffineRegs,
    bg3_affine: AffineRegs,
    window: WindowRegs,
    mosaic: SharedCell<u32>,
    bldcnt: SharedCell<u32>,
    bldalpha: SharedCell<u32>,
    bldy: SharedCell<u32>,
    cycle_in_line: u32,
    line: u32,
    was_hblank: bool,
    front: Vec<u16>,
    back: Vec<u16>,
    frame_ready: bool,
    hblank_entered: bool,
    vblank_entered: bool,
}

impl Video {
    pub fn new(io: &mut IoRegs) -> Self {
        let dispcnt = slot_cell(0);
        let dispstat = slot_cell(0);
        let vcount = slot_cell(0);

        io.add_slot(DISPCNT_ADDR, Slot::new(SlotStorage::Cell(dispcnt.clone()), 0xffff, 0));
        io.add_slot(
            DISPSTAT_ADDR,
            Slot::new(SlotStorage::Cell(dispstat.clone()), 0xff38, 0),
        );
        io.add_slot(VCOUNT_ADDR, Slot::new(SlotStorage::Cell(vcount.clone()), 0xff, 16).read_only());

        let bg = [
            BgRegs::new(io, 0),
            BgRegs::new(io, 1),
            BgRegs::new(io, 2),
            BgRegs::new(io, 3),
        ];
        let bg2_affine = AffineRegs::new(io, BG2_AFFINE_BASE);
        let bg3_affine = AffineRegs::new(io, BG3_AFFINE_BASE);
        let window = WindowRegs::new(io);

        let mosaic = slot_cell(0);
        let bldcnt = slot_cell(0);
        let bldalpha = slot_cell(0);
        let bldy = slot_cell(0);
        io.add_slot(MOSAIC_ADDR, Slot::new(SlotStorage::Cell(mosaic.clone()), 0xffff, 0));
        io.add_slot(BLDCNT_ADDR, Slot::new(SlotStorage::Cell(bldcnt.clone()), 0x3fff, 0));
        io.add_slot(BLDALPHA_ADDR, Slot::new(SlotStorage::Cell(bldalpha.clone()), 0x1f1f, 16));
        io.add_slot(BLDY_ADDR, Slot::new(SlotStorage::Cell(bldy.clone()), 0x1f, 0));

        Self {
            dispcnt,
            dispstat,
            vcount,
            bg,
            bg2_affine,
            bg3_affine,
            window,
            mosaic,
            bldcnt,
            bldalpha,
            bldy,
            cycle_in_line: 0,
            line: 0,
            was_hblank: false,
            front: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            back: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            frame_ready: false,
            hblank_entered: false,
            vblank_entered: false,
        }
    }

    fn mode(&self) -> u32 {
        self.dispcnt.get() & 0x7
    }

    fn forced_blank(&self) -> bool {
        self.dispcnt.get() & (1 << 7) != 0
    }

    pub fn current_line(&self) -> u32 {
        self.line
    }

    pub fn in_vblank(&self) -> bool {
        self.line >= VISIBLE_LINES
    }

    pub fn in_hblank(&self) -> bool {
        self.cycle_in_line / CYCLES_PER_DOT >= HDRAW_DOTS
    }

    /// Advances the display by `cycles` CPU cycles, raising HBlank/VBlank/
    /// VCounterMatch IRQs on their rising edges and rendering a frame to the
    /// back buffer each time line 159 finishes.
    pub fn step(&mut self, mut cycles: u32, vram: &MemBlock, palette: &MemBlock, oam: &MemBlock, irq: &Irq) {
        while cycles > 0 {
            let take = cycles.min(LINE_CYCLES - self.cycle_in_line);
            self.cycle_in_line += take;
            cycles -= take;
            self.update_hblank(irq);
            if self.cycle_in_line >= LINE_CYCLES {
                self.cycle_in_line = 0;
                self.advance_line(vram, palette, oam, irq);
            }
        }
    }

    fn update_hblank(&mut self, irq: &Irq) {
        let now_hblank = self.in_hblank();
        if now_hblank {
            self.dispstat.set(self.dispstat.get() | (1 << 1));
        } else {
            self.dispstat.set(self.dispstat.get() & !(1 << 1));
        }
        if now_hblank && !self.was_hblank {
            self.hblank_entered = true;
            if self.dispstat.get() & (1 << 4) != 0 {
                irq.request(IrqSource::HBlank);
            }
        }
        self.was_hblank = now_hblank;
    }

    /// Consumes the one-shot "a new HBlank period just started" signal the
    /// scheduler uses to fire HBlank-timed DMA.
    pub fn take_hblank_entered(&mut self) -> bool {
        std::mem::take(&mut self.hblank_entered)
    }

    /// Consumes the one-shot "VBlank just started" signal the scheduler
    /// uses to fire VBlank-timed DMA.
    pub fn take_vblank_entered(&mut self) -> bool {
        std::mem::take(&mut self.vblank_entered)
    }

    fn advance_line(&mut self, vram: &MemBlock, palette: &MemBlock, oam: &MemBlock, irq: &Irq) {
        self.line = (self.line + 1) % TOTAL_LINES;
        self.vcount.set(self.line);

        let target = (self.dispstat.get() >> 8) & 0xff;
        if self.line == target {
            self.dispstat.set(self.dispstat.get() | (1 << 2));
            if self.dispstat.get() & (1 << 5) != 0 {
                irq.request(IrqSource::VCounterMatch);
            }
        } else {
            self.dispstat.set(self.dispstat.get() & !(1 << 2));
        }

        if self.line == VISIBLE_LINES {
            self.dispstat.set(self.dispstat.get() | 1);
            self.vblank_entered = true;
            if self.dispstat.get() & (1 << 3) != 0 {
                irq.request(IrqSource::VBlank);
            }
            self.render(vram, palette, oam);
            std::mem::swap(&mut self.front, &mut self.back);
            self.frame_ready = true;
        } else if self.line == 0 {
            self.dispstat.set(self.dispstat.get() & !1);
        }
    }

    fn render(&mut self, vram: &MemBlock, palette: &MemBlock, oam: &MemBlock) {
        if self.forced_blank() {
            for px in self.back.iter_mut() {
                *px = 0x7fff;
            }
            return;
        }
        let frame = ((self.dispcnt.get() >> 4) & 1) as usize;
        match self.mode() {
            0 => self.render_scanlines(vram, palette, oam, [BgKind::Text; 4]),
            1 => self.render_scanlines(vram, palette, oam, [BgKind::Text, BgKind::Text, BgKind::Affine, BgKind::None]),
            2 => self.render_scanlines(vram, palette, oam, [BgKind::None, BgKind::None, BgKind::Affine, BgKind::Affine]),
            3 => self.render_scanlines(vram, palette, oam, [BgKind::None, BgKind::None, BgKind::Bitmap3, BgKind::None]),
            4 => {
                let kinds = [BgKind::None, BgKind::None, BgKind::Bitmap4, BgKind::None];
                self.render_scanlines_with_frame(vram, palette, oam, kinds, frame)
            }
            5 => self.render_scanlines(vram, palette, oam, [BgKind::None, BgKind::None, BgKind::Bitmap5, BgKind::None]),
            _ => {
                let backdrop = palette.read16(0);
                for px in self.back.iter_mut() {
                    *px = backdrop;
                }
            }
        }
    }

    fn render_scanlines(&mut self, vram: &MemBlock, palette: &MemBlock, oam: &MemBlock, kinds: [BgKind; 4]) {
        self.render_scanlines_with_frame(vram, palette, oam, kinds, 0);
    }

    fn render_scanlines_with_frame(&mut self, vram: &MemBlock, palette: &MemBlock, oam: &MemBlock, kinds: [BgKind; 4], frame: usize) {
        self.bg2_affine.maybe_relatch();
        self.bg2_affine.reload();
        self.bg3_affine.maybe_relatch();
        self.bg3_affine.reload();

        let dispcnt = self.dispcnt.get();
        let bg_enabled = [
            dispcnt & (1 << 8) != 0,
            dispcnt & (1 << 9) != 0,
            dispcnt & (1 << 10) != 0,
            dispcnt & (1 << 11) != 0,
        ];
        let obj_enabled = dispcnt & (1 << 12) != 0;
        let one_d_mapping = dispcnt & (1 << 6) != 0;

        let mosaic = self.mosaic.get();
        let mosaic_bg_h = mosaic & 0xf;
        let mosaic_obj_h = (mosaic >> 8) & 0xf;
        let mosaic_obj_v = (mosaic >> 12) & 0xf;

        let window = WindowConfig {
            win0_enabled: dispcnt & (1 << 13) != 0,
            win1_enabled: dispcnt & (1 << 14) != 0,
            objwin_enabled: dispcnt & (1 << 15) != 0,
            win0_x1: (self.window.win0h.get() >> 8) & 0xff,
            win0_x2: self.window.win0h.get() & 0xff,
            win0_y1: (self.window.win0v.get() >> 8) & 0xff,
            win0_y2: self.window.win0v.get() & 0xff,
            win1_x1: (self.window.win1h.get() >> 8) & 0xff,
            win1_x2: self.window.win1h.get() & 0xff,
            win1_y1: (self.window.win1v.get() >> 8) & 0xff,
            win1_y2: self.window.win1v.get() & 0xff,
            win0_layers: layer_enable(self.window.winin.get() & 0x3f),
            win1_layers: layer_enable((self.window.winin.get() >> 8) & 0x3f),
            outside_layers: layer_enable(self.window.winout.get() & 0x3f),
            objwin_layers: layer_enable((self.window.winout.get() >> 8) & 0x3f),
        };

        let bldcnt = self.bldcnt.get();
        let bldalpha = self.bldalpha.get();
        let bldy = self.bldy.get();
        let backdrop = tile::bg_palette_color(palette, 0);

        let mut bg_colors: [[Option<u16>; 240]; 4] = Default::default();
        let mut bg_priority = [0u8; 4];

        for y in 0..SCREEN_HEIGHT as u32 {
            for bg in 0..4 {
                if !bg_enabled[bg] || kinds[bg] == BgKind::None {
                    bg_colors[bg] = [None; 240];
                    continue;
                }
                let cnt = self.bg[bg].cnt.get();
                bg_priority[bg] = bg::priority(cnt);
                let mosaic_x = if bg::mosaic_enabled(cnt) { mosaic_bg_h } else { 0 };
                match kinds[bg] {
                    BgKind::Text => {
                        let hofs = self.bg[bg].hofs.get() & 0x1ff;
                        let vofs = self.bg[bg].vofs.get() & 0x1ff;
                        bg::render_text_line(cnt, hofs, vofs, y, mosaic_x, vram, palette, &mut bg_colors[bg]);
                    }
                    BgKind::Affine => {
                        let affine = if bg == 2 { &self.bg2_affine } else { &self.bg3_affine };
                        bg::render_affine_line(
                            cnt,
                            affine.ref_x,
                            affine.ref_y,
                            affine.pa(),
                            affine.pc(),
                            mosaic_x,
                            vram,
                            palette,
                            &mut bg_colors[bg],
                        );
                    }
                    BgKind::Bitmap3 => sample_bitmap3_row(y, vram, &mut bg_colors[bg]),
                    BgKind::Bitmap4 => sample_bitmap4_row(y, frame, vram, palette, &mut bg_colors[bg]),
                    BgKind::Bitmap5 => sample_bitmap5_row(y, vram, &mut bg_colors[bg]),
                    BgKind::None => unreachable!(),
                }
            }

            let mut obj_color = [None; 240];
            let mut obj_info = [ObjPixel::default(); 240];
            let mut obj_window = [false; 240];
            if obj_enabled {
                obj::render_obj_line(
                    oam,
                    vram,
                    palette,
                    y,
                    mosaic_obj_h,
                    mosaic_obj_v,
                    one_d_mapping,
                    &mut obj_color,
                    &mut obj_info,
                    &mut obj_window,
                );
            }

            let mut row = [0u16; 240];
            compose_line(
                y,
                &bg_colors,
                bg_priority,
                bg_enabled,
                &obj_color,
                &obj_info,
                obj_enabled,
                &obj_window,
                &window,
                bldcnt,
                bldalpha,
                bldy,
                backdrop,
                &mut row,
            );

            let row_start = y as usize * SCREEN_WIDTH;
            self.back[row_start..row_start + SCREEN_WIDTH].copy_from_slice(&row);

            self.bg2_affine.advance_line();
            self.bg3_affine.advance_line();
        }
    }

    /// Takes the completed frame exactly once; subsequent calls return
    /// `None` until the next vblank renders again.
    pub fn take_frame(&mut self) -> Option<&[u16]> {
        if self.frame_ready {
            self.frame_ready = false;
            Some(&self.front)
        } else {
            None
        }
    }
}

fn sample_bitmap3_row(y: u32, vram: &MemBlock, out: &mut [Option<u16>; 240]) {
    for (x, slot) in out.iter_mut().enumerate() {
        *slot = Some(vram.read16((y as usize * SCREEN_WIDTH + x) * 2));
    }
}

fn sample_bitmap4_row(y: u32, frame: usize, vram: &MemBlock, palette: &MemBlock, out: &mut [Option<u16>; 240]) {
    let base = frame * 0xa000;
    for (x, slot) in out.iter_mut().enumerate() {
        let index = vram.read8(base + y as usize * SCREEN_WIDTH + x);
        *slot = if index == 0 { None } else { Some(tile::bg_palette_color(palette, index)) };
    }
}

fn sample_bitmap5_row(y: u32, vram: &MemBlock, out: &mut [Option<u16>; 240]) {
    const MODE5_WIDTH: usize = 160;
    const MODE5_HEIGHT: usize = 128;
    for (x, slot) in out.iter_mut().enumerate() {
        *slot = if x < MODE5_WIDTH && (y as usize) < MODE5_HEIGHT {
            Some(vram.read16((y as usize * MODE5_WIDTH + x) * 2))
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make() -> (Video, MemBlock, MemBlock, MemBlock, Irq, IoRegs) {
        let mut io = IoRegs::new();
        let video = Video::new(&mut io);
        let irq = Irq::new(&mut io);
        let vram = MemBlock::new(0x1_8000, false);
        let palette = MemBlock::new(0x400, false);
        let oam = MemBlock::new(0x400, false);
        (video, vram, palette, oam, irq, io)
    }

    #[test]
    fn forced_blank_fills_white() {
        let (mut video, vram, palette, oam, irq, io) = make();
        io.write(DISPCNT_ADDR, 2, 1 << 7);
        for _ in 0..(LINE_CYCLES * VISIBLE_LINES) {
            video.step(1, &vram, &palette, &oam, &irq);
        }
        let frame = video.take_frame().unwrap();
        assert!(frame.iter().all(|&p| p == 0x7fff));
    }

    #[test]
    fn mode3_frame_swap_delivers_exactly_one_frame() {
        let (mut video, mut vram, palette, oam, irq, io) = make();
        io.write(DISPCNT_ADDR, 2, 3 | (1 << 10));
        vram.write16(0, 0x1234);
        video.step(LINE_CYCLES * VISIBLE_LINES, &vram, &palette, &oam, &irq);
        let frame = video.take_frame();
        assert!(frame.is_some());
        assert_eq!(0x1234, frame.unwrap()[0]);
        assert!(video.take_frame().is_none());
    }

    #[test]
    fn vblank_flag_set_entering_line_160() {
        let (mut video, vram, palette, oam, irq, _io) = make();
        video.step(LINE_CYCLES * VISIBLE_LINES, &vram, &palette, &oam, &irq);
        assert!(video.in_vblank());
    }

    #[test]
    fn mode0_text_bg_renders_its_tile_through_to_the_frame() {
        let (mut video, mut vram, palette, oam, irq, io) = make();
        io.write(DISPCNT_ADDR, 2, 1 << 8); // mode 0, BG0 enabled
        vram.write16(0, 1);
        for i in 0..32usize {
            vram.write8(32 + i, 0x11);
        }
        video.step(LINE_CYCLES * VISIBLE_LINES, &vram, &palette, &oam, &irq);
        let frame = video.take_frame().unwrap();
        assert_eq!(tile::bg_palette_color(&palette, 1), frame[0]);
    }

    #[test]
    fn mode1_affine_bg2_reloads_reference_point_from_registers() {
        let (mut video, vram, palette, oam, irq, io) = make();
        io.write(DISPCNT_ADDR, 2, 1 | (1 << 10));
        io.write(0x0028, 4, 0x1234);
        video.step(LINE_CYCLES * VISIBLE_LINES, &vram, &palette, &oam, &irq);
        assert_eq!(bg::sign_extend28(0x1234), video.bg2_affine.ref_x);
    }

    #[test]
    fn obj_sprite_draws_over_backdrop_in_mode0() {
        let (mut video, mut vram, mut palette, mut oam, irq, io) = make();
        io.write(DISPCNT_ADDR, 2, 1 << 12); // mode 0, OBJ enabled, no BGs
        palette.write16(0x200 + 2, 0x6318); // obj palette index 1
        for i in 0..32usize {
            vram.write8(0x1_0000 + i, 0x11); // tile 0, 4bpp, solid index 1
        }
        oam.write16(0, 0); // attr0: y=0, normal sprite
        oam.write16(2, 0); // attr1: x=0, size 8x8
        oam.write16(4, 0); // attr2: tile 0, palette bank 0
        video.step(LINE_CYCLES * VISIBLE_LINES, &vram, &palette, &oam, &irq);
        let frame = video.take_frame().unwrap();
        assert_eq!(0x6318, frame[0]);
    }
}
