// This is my own float trait versus the num_traits one: adds the handful of
// constants and helpers the renderer needs everywhere (PI variants, a cheap
// `two()`/`half()`) that num_traits doesn't carry.

use num_traits;

pub trait Float: num_traits::Float + num_traits::Bounded {
    const PI: Self;
    const INV_PI: Self;
    const INV_2PI: Self;
    const PI_OVER_2: Self;

    fn two() -> Self;
    fn half() -> Self;
}

impl Float for f32 {
    const PI: Self = 3.14159265358979323846f32;
    const INV_PI: Self = 0.31830988618379067154f32;
    const INV_2PI: Self = 0.15915494309189533577f32;
    const PI_OVER_2: Self = 1.57079632679489661923f32;

    fn two() -> Self {
        2f32
    }

    fn half() -> Self {
        0.5f32
    }
}

impl Float for f64 {
    const PI: Self = 3.14159265358979323846;
    const INV_PI: Self = 0.31830988618379067154;
    const INV_2PI: Self = 0.15915494309189533577;
    const PI_OVER_2: Self = 1.57079632679489661923;

    fn two() -> Self {
        2.
    }

    fn half() -> Self {
        0.5
    }
}
