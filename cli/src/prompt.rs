use anyhow::Result;
use console::Term;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use perm_watch::subscription::validate_file_id;

/// Terminal prompts. Every method blocks on user input.
pub struct Prompter {
    term: Term,
    theme: ColorfulTheme
}

impl Prompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            theme: ColorfulTheme::default()
        }
    }

    pub fn select(&self, prompt: &str, items: &[&str]) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_on(&self.term)?)
    }

    pub fn text(&self, prompt: &str, default: Option<String>) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(default.is_some());
        if let Some(default) = default {
            input = input.default(default);
        }
        Ok(input.interact_text_on(&self.term)?)
    }

    pub fn file_id(&self) -> Result<String> {
        let id: String = Input::with_theme(&self.theme)
            .with_prompt("Enter the file ID")
            .validate_with(|input: &String| -> Result<(), String> {
                validate_file_id(input.trim()).map_err(|e| e.to_string())
            })
            .interact_text_on(&self.term)?;
        Ok(id.trim().to_string())
    }

    pub fn count(&self, prompt: &str, default: u32) -> Result<u32> {
        Ok(Input::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .validate_with(|input: &u32| -> Result<(), &str> {
                if *input >= 1 {
                    Ok(())
                } else {
                    Err("Enter at least 1")
                }
            })
            .interact_text_on(&self.term)?)
    }
}

impl Default for Prompter {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` on the blocking pool so prompts never stall the runtime.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&Prompter) -> Result<T> + Send + 'static,
    T: Send + 'static
{
    tokio::task::spawn_blocking(move || f(&Prompter::new())).await?
}
