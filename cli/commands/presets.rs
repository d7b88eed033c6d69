use crate::cli_args::PresetsArgs;
use crate::output;
use anyhow::Result;
use codedigest_core::get_exclude_presets;

pub fn handle_presets_command(args: &PresetsArgs) -> Result<()> {
    let presets = get_exclude_presets();
    log::debug!("Listing {} embedded presets", presets.len());
    if args.json {
        output::print_json(&presets)
    } else {
        output::print_presets_table(presets);
        Ok(())
    }
}
