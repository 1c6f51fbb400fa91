#[macro_export]
macro_rules! bfp {
    ($val:literal) => {
        ($val)
            .parse::<$crate::fixed_point::Bfp>()
            .unwrap()
    };
}
