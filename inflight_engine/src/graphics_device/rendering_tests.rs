use super::*;

#[test]
fn test_viewport_defaults_to_unit_depth_range() {
    let viewport = Viewport::new(0.0, 0.0, 1920.0, 1080.0);
    assert_eq!(viewport.min_depth, 0.0);
    assert_eq!(viewport.max_depth, 1.0);
}

#[test]
fn test_index_sizes() {
    assert_eq!(IndexType::U16.size(), 2);
    assert_eq!(IndexType::U32.size(), 4);
}

#[test]
fn test_clear_value_aspects() {
    assert_eq!(ClearValue::Color([0.0; 4]).aspects(), ImageAspects::COLOR);
    assert_eq!(ClearValue::ColorUint([0; 4]).aspects(), ImageAspects::COLOR);
    assert_eq!(
        ClearValue::DepthStencil { depth: 1.0, stencil: 0 }.aspects(),
        ImageAspects::DEPTH | ImageAspects::STENCIL
    );
}

#[test]
fn test_color_rendering_info() {
    let attachments = [RenderingAttachment {
        view: 7u64,
        layout: ImageLayout::ColorAttachment,
        load_op: AttachmentLoadOp::Clear,
        store_op: AttachmentStoreOp::Store,
        clear_value: ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
    }];
    let info = RenderingInfo::color(Rect2D::new(0, 0, 64, 64), &attachments);

    assert_eq!(info.layer_count, 1);
    assert_eq!(info.render_area.extent, [64, 64]);
    assert_eq!(info.color_attachments.len(), 1);
    assert!(info.depth_attachment.is_none());
    assert!(info.stencil_attachment.is_none());
}
