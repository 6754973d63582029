use anyhow::Result;
use remcal_core::RemcalConfig;
use remcal_core::script::encode_calendar;

pub fn run(config: &RemcalConfig, label: Option<String>) -> Result<()> {
    let mut options = config.script_options()?;
    if label.is_some() {
        options.label = label;
    }

    let text = super::read_stdin()?;
    for line in encode_calendar(&text, &options)? {
        println!("{}", line);
    }
    Ok(())
}
