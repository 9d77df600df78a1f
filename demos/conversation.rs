use std::time::Instant;

use podcast_tts::{ConversationSegment, GeneratorConfigBuilder, TtsGenerator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let generator = TtsGenerator::new(
        GeneratorConfigBuilder::default()
            .output_dir("./output")
            .voice_speed(1.0)
            .build()?,
    );

    println!("Available voice profiles:");
    for (name, profile) in generator.list_voice_profiles() {
        println!("  {name:16} {} ({})", profile.name, profile.backend);
    }

    let segments = vec![
        ConversationSegment::new(
            "alex",
            "Welcome back to the show! Today we're digging into how audio \
             pipelines survive on machines where half the tools are missing.",
        ),
        ConversationSegment::new(
            "sam",
            "Right, the trick is never trusting a file extension. [LAUGHS] \
             Engines write whatever container they feel like.",
        ),
        ConversationSegment::new("narrator", "This episode was generated automatically."),
    ];

    let start = Instant::now();
    let audio_path = generator.generate_for_segments("Pipeline Deep Dive", &segments)?;
    println!(
        "Episode written to {} in {:.2?}",
        audio_path.display(),
        start.elapsed()
    );

    Ok(())
}
