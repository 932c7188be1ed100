use crate::video::drm::{
    sys::{DRM_MODE_FLAG_NHSYNC, DRM_MODE_FLAG_PVSYNC},
    DrmModeInfo,
};

const CELL_GRAN: u64 = 8;
const MIN_V_PORCH: u64 = 3;
const MIN_V_BPORCH: u64 = 6;
/// Minimum vsync + back porch in microseconds.
const MIN_VSYNC_BP: f64 = 550.0;
const HSYNC_PERCENT: u64 = 8;
/// Pixel clock granularity in kHz.
const CLOCK_STEP: u64 = 250;
const M_PRIME: f64 = 300.0;
const C_PRIME: f64 = 30.0;

fn vsync_width(width: i32, height: i32) -> u64 {
    let (w, h) = (width as i64, height as i64);
    if w * 3 == h * 4 {
        4
    } else if w * 9 == h * 16 {
        5
    } else if w * 10 == h * 16 {
        6
    } else if w * 4 == h * 5 || w * 9 == h * 15 {
        7
    } else {
        10
    }
}

/// Computes CVT timings for a mode that has none.
///
/// This matches the VESA CVT-1.2 formula with standard blanking, no margins,
/// and no interlacing.
pub fn calculate_mode(width: i32, height: i32, refresh_millihz: u32) -> DrmModeInfo {
    let refresh = match refresh_millihz {
        0 => 60.0,
        r => r as f64 / 1000.0,
    };
    let hdisplay = (width as u64) - (width as u64) % CELL_GRAN;
    let vdisplay = height as u64;
    let vsync = vsync_width(width, height);

    let h_period_est =
        ((1_000_000.0 / refresh) - MIN_VSYNC_BP) / (vdisplay + MIN_V_PORCH) as f64;

    let mut vsync_bp = (MIN_VSYNC_BP / h_period_est) as u64 + 1;
    if vsync_bp < vsync + MIN_V_BPORCH {
        vsync_bp = vsync + MIN_V_BPORCH;
    }
    let vtotal = vdisplay + vsync_bp + MIN_V_PORCH;

    let ideal_duty_cycle = C_PRIME - (M_PRIME * h_period_est / 1000.0);
    let hblank = if ideal_duty_cycle < 20.0 {
        hdisplay * 20 / 80 / (2 * CELL_GRAN) * (2 * CELL_GRAN)
    } else {
        let blank = hdisplay as f64 * ideal_duty_cycle / (100.0 - ideal_duty_cycle);
        (blank / (2 * CELL_GRAN) as f64) as u64 * (2 * CELL_GRAN)
    };
    let htotal = hdisplay + hblank;

    // kHz, reduced to the clock granularity.
    let clock = (htotal as f64 * 1000.0 / h_period_est) as u64 / CLOCK_STEP * CLOCK_STEP;

    let hsync = htotal * HSYNC_PERCENT / 100 / CELL_GRAN * CELL_GRAN;
    let hsync_end = hdisplay + hblank / 2;
    let hsync_start = hsync_end - hsync;

    let vsync_start = vdisplay + MIN_V_PORCH;
    let vsync_end = vsync_start + vsync;

    DrmModeInfo {
        clock: clock as u32,
        hdisplay: hdisplay as u16,
        hsync_start: hsync_start as u16,
        hsync_end: hsync_end as u16,
        htotal: htotal as u16,
        hskew: 0,
        vdisplay: vdisplay as u16,
        vsync_start: vsync_start as u16,
        vsync_end: vsync_end as u16,
        vtotal: vtotal as u16,
        vscan: 0,
        vrefresh: (refresh + 0.5) as u32,
        flags: DRM_MODE_FLAG_NHSYNC | DRM_MODE_FLAG_PVSYNC,
        ty: 0,
        name: format!("{}x{}", width, height).into(),
    }
}

#[cfg(test)]
mod tests;
