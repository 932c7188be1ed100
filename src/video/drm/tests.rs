use {
    super::*,
    crate::video::drm::sys::{
        DRM_MODE_FLAG_DBLSCAN, DRM_MODE_FLAG_INTERLACE, DRM_MODE_FLAG_NHSYNC, DRM_MODE_FLAG_PVSYNC,
    },
    uapi::as_bytes,
};

fn mode_1080p60() -> DrmModeInfo {
    DrmModeInfo {
        clock: 148_500,
        hdisplay: 1920,
        hsync_start: 2008,
        hsync_end: 2052,
        htotal: 2200,
        hskew: 0,
        vdisplay: 1080,
        vsync_start: 1084,
        vsync_end: 1089,
        vtotal: 1125,
        vscan: 0,
        vrefresh: 60,
        flags: 0,
        ty: 0,
        name: "1920x1080".into(),
    }
}

#[test]
fn refresh_rate() {
    let mode = mode_1080p60();
    assert_eq!(mode.refresh_rate_millihz(), 60_000);
}

#[test]
fn refresh_rate_interlace_doubles() {
    let mut mode = mode_1080p60();
    mode.flags |= DRM_MODE_FLAG_INTERLACE;
    assert_eq!(mode.refresh_rate_millihz(), 120_000);
}

#[test]
fn refresh_rate_dblscan_halves() {
    let mut mode = mode_1080p60();
    mode.flags |= DRM_MODE_FLAG_DBLSCAN;
    assert_eq!(mode.refresh_rate_millihz(), 30_000);
}

#[test]
fn refresh_rate_vscan_divides() {
    let mut mode = mode_1080p60();
    mode.vscan = 2;
    assert_eq!(mode.refresh_rate_millihz(), 30_000);
}

#[test]
fn refresh_rate_degenerate_mode() {
    let mut mode = mode_1080p60();
    mode.htotal = 0;
    assert_eq!(mode.refresh_rate_millihz(), 0);
}

#[test]
fn mode_raw_round_trip() {
    let mode = mode_1080p60();
    let raw = mode.to_raw();
    let back: DrmModeInfo = raw.into();
    assert_eq!(mode, back);
}

#[test]
fn mode_name_truncated_with_nul() {
    let mut mode = mode_1080p60();
    mode.name = "x".repeat(100).into();
    let raw = mode.to_raw();
    assert_eq!(raw.name[sys::DRM_DISPLAY_MODE_LEN - 1], 0);
}

#[test]
fn same_timings_ignores_name() {
    let a = mode_1080p60();
    let mut b = mode_1080p60();
    b.name = "other".into();
    assert!(a.same_timings(&b));
    b.clock += 1;
    assert!(!a.same_timings(&b));
}

#[test]
fn cvt_flags_are_distinct() {
    assert_eq!(DRM_MODE_FLAG_NHSYNC & DRM_MODE_FLAG_PVSYNC, 0);
}

#[test]
fn in_formats_parsing() {
    let header = drm_format_modifier_blob {
        version: FORMAT_BLOB_CURRENT,
        flags: 0,
        count_formats: 2,
        formats_offset: size_of::<drm_format_modifier_blob>() as u32,
        count_modifiers: 2,
        modifiers_offset: (size_of::<drm_format_modifier_blob>() + 2 * size_of::<u32>()) as u32,
    };
    let formats: [u32; 2] = [0x34325258, 0x34325241];
    let modifiers = [
        drm_format_modifier {
            // both formats support linear
            formats: 0b11,
            offset: 0,
            pad: 0,
            modifier: 0,
        },
        drm_format_modifier {
            // only the second format supports this one
            formats: 0b10,
            offset: 0,
            pad: 0,
            modifier: 0x0100_0000_0000_0001,
        },
    ];
    let mut blob = vec![];
    blob.extend_from_slice(as_bytes(&header));
    blob.extend_from_slice(as_bytes(&formats[..]));
    blob.extend_from_slice(as_bytes(&modifiers[..]));

    let parsed = parse_in_formats(&blob).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].format, 0x34325258);
    assert_eq!(parsed[0].modifiers.len(), 1);
    assert!(parsed[0].modifiers.contains(&0));
    assert_eq!(parsed[1].modifiers.len(), 2);
    assert!(parsed[1].modifiers.contains(&0x0100_0000_0000_0001));
}

#[test]
fn in_formats_rejects_truncated_blob() {
    let header = drm_format_modifier_blob {
        version: FORMAT_BLOB_CURRENT,
        flags: 0,
        count_formats: 100,
        formats_offset: size_of::<drm_format_modifier_blob>() as u32,
        count_modifiers: 0,
        modifiers_offset: size_of::<drm_format_modifier_blob>() as u32,
    };
    let blob = as_bytes(&header).to_vec();
    assert!(parse_in_formats(&blob).is_err());
}

#[test]
fn change_packs_adjacent_objects() {
    let master = Rc::new(DrmMaster::new(Rc::new(uapi::OwnedFd::new(-1))));
    let mut change = master.change();
    change.change_object(DrmCrtc(10), |c| {
        c.change(DrmProperty(1), 100);
        c.change(DrmProperty(2), 200);
    });
    change.change_object(DrmCrtc(10), |c| {
        c.change(DrmProperty(3), 300);
    });
    change.change_object(DrmPlane(20), |c| {
        c.change(DrmProperty(4), 400);
    });
    // empty changes don't add an object entry
    change.change_object(DrmPlane(21), |_| {});
    let (objects, lengths, props, values) = change.parts();
    assert_eq!(objects, &[10, 20]);
    assert_eq!(lengths, &[3, 1]);
    assert_eq!(props, &[1, 2, 3, 4]);
    assert_eq!(values, &[100, 200, 300, 400]);
}

#[test]
fn connector_type_names() {
    assert_eq!(ConnectorType::from_drm(11).to_string(), "HDMI-A");
    assert_eq!(ConnectorType::from_drm(10).to_string(), "DP");
    assert_eq!(ConnectorType::from_drm(9999).to_string(), "Unknown(9999)");
}

#[test]
fn connector_status_mapping() {
    assert_eq!(ConnectorStatus::from_drm(1), ConnectorStatus::Connected);
    assert_eq!(ConnectorStatus::from_drm(2), ConnectorStatus::Disconnected);
    assert_eq!(ConnectorStatus::from_drm(3), ConnectorStatus::Unknown);
}
