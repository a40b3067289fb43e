//! Interactive setup interview (`camille setup`)

use dialoguer::{Confirm, Input};

use crate::db::DbPool;
use crate::user_memory::{SETUP_SOURCE, UserMemoryManager};

/// Ask the setup questions on the terminal and store the answers
///
/// # Errors
///
/// Returns error if user input fails or answers cannot be stored
pub fn run_setup(pool: DbPool, ai_name: &str) -> anyhow::Result<()> {
    println!("{ai_name} Setup\n");

    let users = UserMemoryManager::new(pool);

    if !users.needs_setup()? {
        println!("Already set up. Current answers:");
        for fact in users.memories(SETUP_SOURCE)? {
            println!("  - {}", fact.value);
        }
        println!();

        let redo = Confirm::new()
            .with_prompt("Answer the questions again?")
            .default(false)
            .interact()?;
        if !redo {
            return Ok(());
        }
    }

    for question in users.setup_questions() {
        let answer: String = Input::new()
            .with_prompt(question.question)
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("please enter an answer")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        users.save_setup_question(question, &answer)?;
    }

    println!("\nThanks! {ai_name} will remember that.");
    if let Some(name) = users.user_name()? {
        println!("Say \"Hey {ai_name}\" whenever you need me, {name}.");
    }

    Ok(())
}
