use bevy::prelude::*;

pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn is_true(value: &bool) -> bool {
    *value
}

pub(crate) fn is_zero_f32(value: &f32) -> bool {
    *value == 0.0
}

pub(crate) fn is_zero_vec3(value: &Vec3) -> bool {
    *value == Vec3::ZERO
}
