use slidekit::FilterPreset;

pub fn cmd_filters(css: bool) {
    println!("🎨 {} filter presets\n", FilterPreset::ALL.len());
    for preset in FilterPreset::ALL {
        if css {
            println!("   {:<10} {}", preset.name(), preset.css());
        } else {
            println!("   {}", preset.name());
        }
    }
}
