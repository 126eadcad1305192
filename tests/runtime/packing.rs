use bevy::prelude::*;
use bevy_embers::asset::{Curve, CurveSet, EmitterSettings};
use bevy_embers::emitter::EmitterError;
use bevy_embers::textures::pack::{
    ChannelLayout, ChannelPairing, PackedChannelBuffer, Packed3, decode_rgba8, pack3, unpack3,
};
use bevy_embers::textures::quantize::{QuantizedCurve, quantize};
use bevy_embers::textures::{EmitterChannels, create_byte_texture, create_float_texture};

fn scalar(values: &[f32]) -> QuantizedCurve {
    QuantizedCurve::from_samples(1, values.to_vec())
}

fn vector(values: &[Vec3]) -> QuantizedCurve {
    QuantizedCurve::from_samples(3, values.iter().flat_map(|v| v.to_array()).collect())
}

#[test]
fn pack3_round_trips_within_one_byte_step() {
    let steps = [0.0, 0.1, 0.25, 0.333, 0.5, 0.75, 0.9, 0.999];
    for &a in &steps {
        for &b in &steps {
            for &c in &steps {
                let [ua, ub, uc] = unpack3(pack3(a, b, c));
                assert!((ua - a).abs() <= 1.0 / 255.0, "a: {a} -> {ua}");
                assert!((ub - b).abs() <= 1.0 / 255.0, "b: {b} -> {ub}");
                assert!((uc - c).abs() <= 1.0 / 255.0, "c: {c} -> {uc}");
            }
        }
    }
}

#[test]
fn packed3_float_is_exact_for_every_byte_triple() {
    for bytes in [[0, 0, 0], [255, 255, 254], [1, 2, 3], [128, 0, 255]] {
        let packed = Packed3::from_bytes(bytes);
        assert_eq!(Packed3::from_f32(packed.to_f32()).bytes(), bytes);
        assert!(packed.to_f32() < 1.0);
    }
}

#[test]
fn pack3_saturates_out_of_range_inputs() {
    assert_eq!(Packed3::new(-1.0, 2.0, 0.5).bytes(), [0, 255, 127]);
}

#[test]
fn vec3_plus_3_scalars_keeps_vector_at_full_precision() {
    let offsets = vector(&[Vec3::new(1.5, -2.25, 1e-3), Vec3::new(100.0, 0.0, -7.0)]);
    let buffer = PackedChannelBuffer::vec3_plus_3_scalars(
        ChannelPairing::LocalOffsetAndDivergences,
        &offsets,
        &scalar(&[0.2, 0.4]),
        &scalar(&[0.6, 0.8]),
        &scalar(&[0.0, 0.5]),
    )
    .unwrap();

    assert_eq!(buffer.len(), 2);
    assert_eq!(&buffer.texels()[1][..3], &[100.0, 0.0, -7.0]);

    let decoded = buffer.sample(1.0);
    assert_eq!(decoded.vector, Vec3::new(100.0, 0.0, -7.0));
    assert!(decoded.scalars.abs_diff_eq(Vec3::new(0.4, 0.8, 0.5), 1.0 / 255.0));
}

#[test]
fn two_scalars_plus_vec3_leaves_third_component_unused() {
    let buffer = PackedChannelBuffer::two_scalars_plus_vec3(
        ChannelPairing::AngleScaleAndWorldDivergence,
        &scalar(&[3.0, 4.0]),
        &scalar(&[0.5, 2.0]),
        &vector(&[Vec3::new(0.1, 0.2, 0.3), Vec3::splat(0.9)]),
    )
    .unwrap();

    let texel = buffer.texels()[0];
    assert_eq!(texel[0], 3.0);
    assert_eq!(texel[1], 0.5);
    assert_eq!(texel[2], 0.0);

    let decoded = buffer.sample(0.0);
    assert_eq!(decoded.scalars, Vec3::new(3.0, 0.5, 0.0));
    assert!(decoded.vector.abs_diff_eq(Vec3::new(0.1, 0.2, 0.3), 1.0 / 255.0));
}

#[test]
fn sampling_unpacks_before_interpolating() {
    let buffer = PackedChannelBuffer::vec3_plus_vec3(
        ChannelPairing::WorldOffsetAndLocalDivergence,
        &vector(&[Vec3::ZERO, Vec3::ZERO]),
        &vector(&[Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]),
    )
    .unwrap();

    // interpolating the packed float itself would smear bytes across components
    let mid = buffer.sample(0.5).scalars;
    assert!(mid.abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1.0 / 255.0));
}

#[test]
fn decoding_with_the_wrong_pairing_fails() {
    let buffer = PackedChannelBuffer::vec3_plus_vec3(
        ChannelPairing::WorldOffsetAndLocalDivergence,
        &vector(&[Vec3::ZERO]),
        &vector(&[Vec3::ZERO]),
    )
    .unwrap();

    assert_eq!(
        buffer.expect_pairing(ChannelPairing::LocalOffsetAndDivergences),
        Err(EmitterError::PackedPairing {
            expected: ChannelPairing::LocalOffsetAndDivergences,
            found: ChannelPairing::WorldOffsetAndLocalDivergence,
        })
    );
    assert!(
        buffer
            .expect_pairing(ChannelPairing::WorldOffsetAndLocalDivergence)
            .is_ok()
    );
}

#[test]
fn packing_a_pairing_with_the_wrong_layout_fails() {
    let result = PackedChannelBuffer::vec3_plus_vec3(
        ChannelPairing::AngleScaleAndWorldDivergence,
        &vector(&[Vec3::ZERO]),
        &vector(&[Vec3::ZERO]),
    );
    assert_eq!(
        result,
        Err(EmitterError::PackedLayout {
            pairing: ChannelPairing::AngleScaleAndWorldDivergence,
            layout: ChannelLayout::Vec3Packed3,
        })
    );
}

#[test]
fn mismatched_channel_lengths_fail() {
    let result = PackedChannelBuffer::vec3_plus_3_scalars(
        ChannelPairing::LocalOffsetAndDivergences,
        &vector(&[Vec3::ZERO, Vec3::ZERO]),
        &scalar(&[0.0, 0.0]),
        &scalar(&[0.0]),
        &scalar(&[0.0, 0.0]),
    );
    assert!(matches!(
        result,
        Err(EmitterError::PackedLength {
            expected: 2,
            found: 1,
            ..
        })
    ));
}

#[test]
fn hdr_color_is_rescaled_and_recovered() {
    let settings = EmitterSettings {
        smoothness: 0.0,
        precision: 8,
        color: CurveSet::new(
            Curve::constant(2.0),
            Curve::constant(1.0),
            Curve::constant(0.5),
        ),
        ..default()
    };
    let channels = EmitterChannels::quantize(&settings);
    let (buffer, color_mult) = channels.pack_color().unwrap();

    assert!(color_mult >= 2.0);

    let bytes = buffer.to_rgba8(color_mult);
    let decoded = decode_rgba8(bytes[0], color_mult);
    let step = color_mult / 255.0;
    assert!((decoded.x - 2.0).abs() <= step);
    assert!((decoded.y - 1.0).abs() <= step);
    assert!((decoded.z - 0.5).abs() <= step);
}

#[test]
fn ldr_color_keeps_unit_multiplier() {
    let settings = EmitterSettings {
        color: CurveSet::constant(Vec3::new(0.2, 0.4, 1.0)),
        ..default()
    };
    let (_, color_mult) = EmitterChannels::quantize(&settings).pack_color().unwrap();
    assert_eq!(color_mult, 1.0);
}

#[test]
fn emitter_channels_pack_into_three_pairings() {
    let settings = EmitterSettings {
        precision: 16,
        ..default()
    };
    let packed = EmitterChannels::quantize(&settings).pack().unwrap();

    assert_eq!(
        packed.internal0.pairing(),
        ChannelPairing::LocalOffsetAndDivergences
    );
    assert_eq!(
        packed.internal1.pairing(),
        ChannelPairing::WorldOffsetAndLocalDivergence
    );
    assert_eq!(
        packed.internal2.pairing(),
        ChannelPairing::AngleScaleAndWorldDivergence
    );
    assert!(packed.validate().is_ok());
    assert_eq!(packed.internal0.len(), 16);
}

#[test]
fn textures_are_one_texel_per_sample() {
    let curve = quantize(&Curve::constant(0.5), 12, 0.0);
    let buffer = PackedChannelBuffer::vec3_plus_3_scalars(
        ChannelPairing::LocalOffsetAndDivergences,
        &quantize(&CurveSet::default(), 12, 0.0),
        &curve,
        &curve,
        &curve,
    )
    .unwrap();

    let float_image = create_float_texture(buffer.texels());
    assert_eq!(float_image.width(), 12);
    assert_eq!(float_image.height(), 1);

    let byte_image = create_byte_texture(&buffer.to_rgba8(1.0));
    assert_eq!(byte_image.width(), 12);
    assert_eq!(byte_image.data.as_ref().map(Vec::len), Some(12 * 4));
}
