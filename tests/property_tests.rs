use proptest::prelude::*;
use vidmark_annotate::codec::RleMask;
use vidmark_annotate::transform::{display_to_image, image_to_display, image_to_model, model_to_image};
use vidmark_annotate::{compress_mask, decompress_mask, Bitmap, Mask};
use vidmark_core::{BBox, Dimensions};

fn bitmap_strategy() -> impl Strategy<Value = Bitmap> {
    (1usize..40, 1usize..40).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<bool>(), w * h)
            .prop_map(move |bits| Bitmap::new(w, h, bits).unwrap())
    })
}

proptest! {
    #[test]
    fn test_display_round_trip(
        sw in 10.0f64..4000.0,
        sh in 10.0f64..4000.0,
        iw in 10.0f64..4000.0,
        ih in 10.0f64..4000.0,
        nx in 0.0f64..=1.0,
        ny in 0.0f64..=1.0,
    ) {
        let surface = Dimensions::new(sw, sh);
        let image = Dimensions::new(iw, ih);
        let (px, py) = image_to_display(surface, image, nx, ny).unwrap();

        // projected points stay on the surface
        prop_assert!(px >= -1e-6 && px <= sw + 1e-6);
        prop_assert!(py >= -1e-6 && py <= sh + 1e-6);

        let (rx, ry) = display_to_image(surface, image, px, py).unwrap();
        prop_assert!((rx - nx).abs() < 1e-9);
        prop_assert!((ry - ny).abs() < 1e-9);
    }

    #[test]
    fn test_model_round_trip(
        iw in 1.0f64..5000.0,
        ih in 1.0f64..5000.0,
        nx in 0.0f64..=1.0,
        ny in 0.0f64..=1.0,
    ) {
        let image = Dimensions::new(iw, ih);
        let (mx, my) = image_to_model(image, 1024.0, nx, ny).unwrap();
        prop_assert!(mx >= 0.0 && mx <= 1024.0 + 1e-6);
        prop_assert!(my >= 0.0 && my <= 1024.0 + 1e-6);

        let (rx, ry) = model_to_image(image, 1024.0, mx, my).unwrap();
        prop_assert!((rx - nx).abs() < 1e-9);
        prop_assert!((ry - ny).abs() < 1e-9);
    }

    #[test]
    fn test_rle_round_trip(bitmap in bitmap_strategy()) {
        let rle = RleMask::from_bitmap(&bitmap);
        let total: usize = rle.encoding.iter().map(|(_, run)| run).sum();
        prop_assert_eq!(total, bitmap.width() * bitmap.height());
        // adjacent runs always alternate
        prop_assert!(rle.encoding.windows(2).all(|w| w[0].0 != w[1].0));

        let encoded = compress_mask(&Mask::from(&bitmap)).unwrap();
        prop_assert_eq!(decompress_mask(&encoded).unwrap(), bitmap);
    }

    #[test]
    fn test_uniform_masks_single_run(w in 1usize..300, h in 1usize..300, fill in any::<bool>()) {
        let value = if fill { 1.0 } else { 0.0 };
        let bitmap = Mask::filled(w, h, value).unwrap().binarize(0.5);
        let rle = RleMask::from_bitmap(&bitmap);
        prop_assert_eq!(rle.encoding, vec![(u8::from(fill), w * h)]);
    }

    #[test]
    fn test_bbox_contains_foreground(bitmap in bitmap_strategy()) {
        match bitmap.bounding_box() {
            None => prop_assert_eq!(bitmap.foreground_count(), 0),
            Some(bbox) => {
                prop_assert!(bbox.is_valid());
                let (w, h) = (bitmap.width(), bitmap.height());
                for (i, bit) in bitmap.bits().iter().enumerate() {
                    if *bit {
                        let (x, y) = ((i % w) as f64, (i / w) as f64);
                        prop_assert!(x / w as f64 >= bbox.x1 && (x + 1.0) / w as f64 <= bbox.x2 + 1e-12);
                        prop_assert!(y / h as f64 >= bbox.y1 && (y + 1.0) / h as f64 <= bbox.y2 + 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn test_bbox_from_slice_validation(values in prop::collection::vec(-0.5f64..1.5, 0..6)) {
        let parsed = BBox::from_slice(&values);
        let expected = values.len() == 4
            && values.iter().all(|v| (0.0..=1.0).contains(v))
            && values[2] >= values[0]
            && values[3] >= values[1];
        prop_assert_eq!(parsed.is_some(), expected);
    }
}
