//! `cargo run -p storage --features seed --bin seed -- --db sqlite://course.sqlite3`

use clap::Parser;

use course_core::answer_key::{OptionDraft, QuestionDraft, SurveyDraft, validate_survey};
use course_core::model::{Role, User, UserId, Video, VideoId};
use storage::repository::{CatalogRepository, Storage, UserRepository};

/// Populate a demo course: videos, one knowledge-check survey per video, a
/// follow-up survey, an admin and two learners. Safe to re-run.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// `SQLite` URL to seed.
    #[arg(long = "db", env = "COURSE_DB_URL", default_value = "sqlite://course.sqlite3")]
    db_url: String,

    /// Number of videos.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    videos: u32,

    /// Duration of each video in seconds.
    #[arg(long = "duration", default_value_t = 600)]
    duration_seconds: u32,

    /// Email of the seeded admin.
    #[arg(long, default_value = "admin@example.com")]
    admin_email: String,
}

fn option(text: &str, is_correct: bool) -> OptionDraft {
    OptionDraft {
        order: None,
        text: text.to_owned(),
        is_correct,
    }
}

fn video_survey_draft(video: VideoId, order: u32) -> SurveyDraft {
    let questions = vec![
        QuestionDraft {
            order: None,
            text: format!("What was the main topic of part {order}?"),
            options: vec![
                option("The topic covered in this part", true),
                option("An unrelated topic", false),
                option("Nothing in particular", false),
            ],
        },
        QuestionDraft {
            order: None,
            text: "Would you apply what you learned?".to_owned(),
            options: vec![option("Yes", true), option("No", false)],
        },
        QuestionDraft {
            order: None,
            text: "Did the part end with a summary?".to_owned(),
            options: vec![option("Yes", true), option("No", false)],
        },
    ];
    SurveyDraft {
        title: format!("Check after video {order}"),
        kind: "VIDEO".to_owned(),
        video_id: Some(video),
        is_active: true,
        questions,
    }
}

fn follow_up_draft() -> SurveyDraft {
    SurveyDraft {
        title: "Six-month follow-up".to_owned(),
        kind: "FOLLOWUP".to_owned(),
        video_id: None,
        is_active: true,
        questions: vec![
            QuestionDraft {
                order: None,
                text: "Has your behaviour changed since the course?".to_owned(),
                options: vec![option("Yes", true), option("No", false)],
            },
            QuestionDraft {
                order: None,
                text: "Would you recommend the course?".to_owned(),
                options: vec![option("Yes", true), option("No", false)],
            },
        ],
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let storage = Storage::sqlite(&args.db_url).await?;

    storage
        .users
        .upsert_user(&User::new(UserId::new(1), &args.admin_email, Role::Admin))
        .await?;
    for id in 2..=3 {
        storage
            .users
            .upsert_user(&User::new(
                UserId::new(id),
                format!("learner{}@example.com", id - 1),
                Role::Learner,
            ))
            .await?;
    }

    let mut surveys = 0;
    for order in 1..=args.videos {
        let id = VideoId::new(u64::from(order));
        let url = format!("https://example.com/videos/{order}.mp4");
        let url = Video::parse_url(Some(url.as_str()))?;
        let video = Video::new(
            id,
            order,
            format!("Training video {order}"),
            url,
            args.duration_seconds,
            true,
        )?;
        storage.catalog.upsert_video(&video).await?;

        if storage.catalog.active_video_survey(id).await?.is_none() {
            let survey = validate_survey(&video_survey_draft(id, order))?;
            storage.catalog.create_survey(&survey).await?;
            surveys += 1;
        }
    }

    let has_follow_up = storage
        .catalog
        .list_active_surveys()
        .await?
        .iter()
        .any(|s| s.kind.is_follow_up());
    if !has_follow_up {
        let survey = validate_survey(&follow_up_draft())?;
        storage.catalog.create_survey(&survey).await?;
        surveys += 1;
    }

    println!(
        "Seeded {} videos, {} new surveys and 3 users into {}",
        args.videos, surveys, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
