use rand::Rng;

/// Generates a numeric code of `length` digits.
///
/// Digits are drawn uniformly with replacement from the thread-local
/// generator. This is not a CSPRNG; the code length is the knob for
/// brute-force resistance within the TTL window.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}
