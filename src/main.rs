use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use ibdaa::{
    ChatFlow, Config, EditorFlow, EditorState, GeminiClient, Sender, SpeechOutput, SpeechSink,
};

/// Ibdaa - AI image editing and Arabic voice chat studio
#[derive(Parser)]
#[command(name = "ibdaa", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable spoken replies (for machines without audio output)
    #[arg(long, env = "IBDAA_DISABLE_SPEECH")]
    disable_speech: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Edit one image and save the result
    Edit {
        /// Image file to edit (png, jpeg, gif, webp)
        #[arg(short, long)]
        image: PathBuf,

        /// Edit instruction
        #[arg(short, long)]
        prompt: String,

        /// Directory for the edited file
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Speak a line through the speech output
    Say {
        /// Text to speak
        #[arg(default_value = "أهلاً بك في استوديو الإبداع الذكي")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ibdaa=info",
        1 => "info,ibdaa=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // A missing API key halts the studio before anything else runs
    let config = Config::from_env()?;
    let client = Arc::new(GeminiClient::new(config));

    let speech = Arc::new(if cli.disable_speech {
        tracing::info!("speech explicitly disabled via --disable-speech");
        SpeechOutput::disabled(Arc::clone(&client))
    } else {
        SpeechOutput::new(Arc::clone(&client))
    });

    match cli.command {
        Some(Command::Edit { image, prompt, out }) => {
            run_edit(client.as_ref(), &image, &prompt, &out).await
        }
        Some(Command::Say { text }) => run_say(speech.as_ref(), &text).await,
        None => run_studio(&client, &speech).await,
    }
}

/// One-shot edit: load, request, save
async fn run_edit(
    client: &GeminiClient,
    image: &Path,
    prompt: &str,
    out: &Path,
) -> anyhow::Result<()> {
    let mut editor = EditorFlow::new();
    editor.load_image(image)?;
    editor.set_prompt(prompt);
    editor.request_edit(client).await;

    if let Some(note) = editor.note() {
        println!("{note}");
    }
    if let Some(error) = editor.error() {
        anyhow::bail!("{error}");
    }
    match editor.save_edited(out)? {
        Some(path) => println!("saved {}", path.display()),
        None => println!("no edited image to save"),
    }
    Ok(())
}

/// Speak one line and wait for playback to drain
async fn run_say(speech: &SpeechOutput, text: &str) -> anyhow::Result<()> {
    if !speech.is_enabled() {
        anyhow::bail!("speech output is unavailable");
    }
    speech.speak(text);

    // Synthesis happens before the speaking flag rises; give it a moment
    for _ in 0..100 {
        if speech.is_speaking() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    while speech.is_speaking() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

const STUDIO_HELP: &str = "\
commands:
  :open <path>     load an image
  :edit <prompt>   request an edit of the loaded image
  :save [dir]      save the edited image (default: current directory)
  :replay          speak the last reply again
  :status          show the editor state
  :reset           clear the editor session
  :quit            leave the studio
anything else is sent to the chat assistant";

/// Interactive studio session composing both flows
async fn run_studio(client: &Arc<GeminiClient>, speech: &Arc<SpeechOutput>) -> anyhow::Result<()> {
    println!("استوديو الإبداع الذكي");
    println!("{STUDIO_HELP}");

    let mut chat = ChatFlow::new(Arc::clone(speech) as Arc<dyn SpeechSink>);
    let mut editor = EditorFlow::new();

    if let Some(greeting) = chat.last_message() {
        println!("ai> {}", greeting.text);
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            prompt()?;
            continue;
        }

        if let Some(rest) = line.strip_prefix(':') {
            let (command, arg) = rest
                .split_once(' ')
                .map_or((rest, ""), |(c, a)| (c, a.trim()));
            if command == "quit" || command == "q" {
                break;
            }
            handle_editor_command(&mut editor, &chat, client.as_ref(), command, arg).await;
        } else {
            chat.submit(client.as_ref(), &line).await;
            if let Some(message) = chat.last_message() {
                if message.sender == Sender::Ai {
                    println!("ai> {}", message.text);
                }
            }
        }
        prompt()?;
    }

    speech.cancel();
    Ok(())
}

async fn handle_editor_command(
    editor: &mut EditorFlow,
    chat: &ChatFlow,
    client: &GeminiClient,
    command: &str,
    arg: &str,
) {
    match command {
        "open" => match editor.load_image(Path::new(arg)) {
            Ok(()) => println!("تم تحميل الصورة: {arg}"),
            Err(e) => println!("{e}"),
        },
        "edit" => {
            if !arg.is_empty() {
                editor.set_prompt(arg);
            }
            editor.request_edit(client).await;
            if let Some(note) = editor.note() {
                println!("{note}");
            }
            match editor.state() {
                EditorState::Edited => println!("تم التعديل؛ استخدم :save للحفظ"),
                _ => {
                    if let Some(error) = editor.error() {
                        println!("{error}");
                    }
                }
            }
        }
        "save" => {
            let dir = if arg.is_empty() { "." } else { arg };
            match editor.save_edited(Path::new(dir)) {
                Ok(Some(path)) => println!("saved {}", path.display()),
                Ok(None) => println!("لا توجد صورة معدلة بعد"),
                Err(e) => println!("{e}"),
            }
        }
        "replay" => {
            if !chat.transcript().is_empty() {
                chat.speak_message(chat.transcript().len() - 1);
            }
        }
        "status" => println!("{:?}", editor.state()),
        "reset" => {
            editor.reset();
            println!("تمت إعادة التعيين");
        }
        _ => println!("{STUDIO_HELP}"),
    }
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}
