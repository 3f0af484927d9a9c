/// Converts a 0..=100 rating to the legacy 0..=5 star scale, rounding half up.
/// Out-of-range input is clamped onto the star scale.
pub const fn rating100_to_5(rating100: i32) -> i32 {
    let stars = rating100.saturating_add(10).div_euclid(20);
    if stars < 0 {
        0
    } else if stars > 5 {
        5
    } else {
        stars
    }
}
