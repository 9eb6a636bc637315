use densemat_backend_tests::define_backend_tests;

define_backend_tests!(cpu_backend, || {
    std::sync::Arc::new(densemat_backend_ref_cpu::CpuBackend::new())
});

#[test]
fn linear_combination_matches_host() -> anyhow::Result<()> {
    use rand::SeedableRng;

    let backend = std::sync::Arc::new(densemat_backend_ref_cpu::CpuBackend::new());
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
    densemat_backend_tests::suite::linear_combination(&backend, &mut rng, 131, 33)
}
