use handoff_core::Variant;

pub fn variants_handler() {
    for variant in Variant::all() {
        let name: &'static str = variant.into();
        println!(
            "{:<10} {} locks  {:<9} {}",
            name,
            variant.lock_count(),
            if variant.is_correct() { "correct" } else { "defective" },
            variant.description()
        );
    }
}
