use calibre_core::batch::config::BatchConfig;
use console::Style;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_batch_summary(config: &BatchConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Calibration Batch"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!("  {}", s.header.apply_to("Masters"));
    print_optional_path(&s, "Bias", config.calibration.bias_path.as_deref());
    print_optional_path(&s, "Dark", config.calibration.dark_path.as_deref());
    print_optional_path(&s, "Flat", config.calibration.flat_path.as_deref());
    println!();

    println!("  {}", s.header.apply_to("Calibration"));
    println!(
        "    {:<16}{}",
        s.label.apply_to("Pedestal"),
        s.value.apply_to(format!("{:?}", config.calibration.pedestal))
    );
    if config.calibration.optimize_dark_scale {
        println!(
            "    {:<16}{}",
            s.label.apply_to("Dark scale"),
            s.value.apply_to("optimized")
        );
    } else {
        println!(
            "    {:<16}{}",
            s.label.apply_to("Dark scale"),
            s.disabled.apply_to("fixed")
        );
    }
    println!(
        "    {:<16}{}",
        s.label.apply_to("Noise algo"),
        s.value.apply_to(&config.calibration.noise_algorithm)
    );
    println!();

    println!("  {}", s.header.apply_to("Output"));
    println!(
        "    {:<16}{}",
        s.label.apply_to("Format"),
        s.value.apply_to(&config.output_format)
    );
    println!(
        "    {:<16}{}{}{}",
        s.label.apply_to("Naming"),
        config.output.prefix,
        "<stem>",
        config.output.postfix
    );
    println!(
        "    {:<16}{}",
        s.label.apply_to("Error policy"),
        s.value.apply_to(&config.error_policy)
    );
    println!();
}

fn print_optional_path(s: &Styles, label: &str, path: Option<&std::path::Path>) {
    match path {
        Some(p) => println!("    {:<16}{}", s.label.apply_to(label), s.path.apply_to(p.display())),
        None => println!("    {:<16}{}", s.label.apply_to(label), s.disabled.apply_to("none")),
    }
}
