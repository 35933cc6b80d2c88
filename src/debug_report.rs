use respace::program::{Instruction, Pointer, PointerKind};
use respace::{ProgramResolution, ProgramSpace};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const DECISION_PREVIEW: usize = 8;

pub fn print_run(space: &ProgramSpace, resolution: &ProgramResolution, seed: u64, color: bool) {
    let palette = ansi::Palette::new(color);
    let config = space.config();
    println!(
        "\n{}",
        palette.bold(palette.paint(
            format!("⚙  Program space ({}, seed {seed})", config.policy.name()),
            ansi::CYAN
        ))
    );

    println!("\n{}", palette.paint("━━━ Program ━━━", ansi::GRAY));
    for (idx, instruction) in resolution.program.instructions.iter().enumerate() {
        println!(
            "  {} {}",
            palette.paint(format!("[{idx:>2}]"), ansi::GRAY),
            fmt_instruction(instruction, config.variable_slots, &palette)
        );
    }
    match resolution.epochs {
        Some(epochs) => println!("  {} {}", palette.dim("epochs:"), palette.paint(epochs.to_string(), ansi::YELLOW)),
        None => println!("  {}", palette.dim("no epoch fidelity")),
    }

    println!("\n{}", palette.paint("━━━ Decisions ━━━", ansi::GRAY));
    print_decisions(resolution, &palette);

    let metrics = &resolution.metrics;
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Decisions: {}  │  Pinned: {}  │  Drawn: {}  │  Depth: {}",
        palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
        palette.paint(metrics.decisions.to_string(), ansi::BLUE),
        palette.paint(metrics.overridden.to_string(), ansi::MAGENTA),
        palette.paint(metrics.sampled.to_string(), ansi::CYAN),
        palette.dim(metrics.max_depth.to_string()),
    );
    println!();
}

fn print_decisions(resolution: &ProgramResolution, palette: &ansi::Palette) {
    let trace = &resolution.trace;
    if trace.is_empty() {
        println!("{}", palette.dim("  No decisions visited"));
        return;
    }

    for (key, value) in trace.samplings.iter().take(DECISION_PREVIEW) {
        println!("  {} {} {}", palette.dim(key), palette.dim("="), palette.paint(value.to_string(), ansi::YELLOW));
    }
    if trace.len() > DECISION_PREVIEW {
        println!("  {}", palette.dim(format!("... +{} more (use --json for the full record)", trace.len() - DECISION_PREVIEW)));
    }
    for (name, value) in &trace.environment {
        println!("  {} {} {}", palette.paint(name, ansi::BLUE), palette.dim("="), palette.paint(value.to_string(), ansi::YELLOW));
    }
}

fn fmt_instruction(instruction: &Instruction, variable_slots: u8, palette: &ansi::Palette) -> String {
    let inputs = instruction
        .inputs
        .iter()
        .map(|pointer| fmt_pointer(*pointer, variable_slots, palette))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{} {} {}({})",
        fmt_pointer(instruction.output, variable_slots, palette),
        palette.dim("="),
        palette.bold(instruction.function.name()),
        inputs
    )
}

fn fmt_pointer(pointer: Pointer, variable_slots: u8, palette: &ansi::Palette) -> String {
    let color = match PointerKind::classify(pointer.tag(), variable_slots) {
        Some(PointerKind::Parameter) => ansi::GREEN,
        Some(PointerKind::Constant) => ansi::MAGENTA,
        Some(PointerKind::Variable) | None => ansi::BLUE,
    };
    palette.paint(pointer.to_string(), color)
}
