use std::io;
use std::io::Write;
use termion::{style, color, color::Rgb};

/// Prints the given string with the given color.
///
/// ## Example
/// ```
/// use binpick::utils::utils_console::{binpick_print, PrintMode, PrintColor};
/// binpick_print("test", PrintMode::Println, PrintColor::Cyan, false);
/// ```
pub fn binpick_print(s: &str, mode: PrintMode, color: PrintColor, bolded: bool) {
    let mut string = "".to_string();
    if bolded { string += format!("{}", style::Bold).as_str() }
    if &color != &PrintColor::None {
        let c = color.get_color_triple();
        string += format!("{}", color::Fg(Rgb(c.0, c.1, c.2))).as_str();
    }
    string += s;
    string += format!("{}", style::Reset).as_str();
    match mode {
        PrintMode::Println => { println!("{}", string); }
        PrintMode::Print => { print!("{}", string); }
    }
}

/// Overwrites the current terminal line with the given string.  Used for
/// per-frame progress output (e.g., trajectory execution time) where a full
/// println per simulation step would flood the console.
pub fn binpick_status(s: &str, color: PrintColor) {
    let mut string = "\r".to_string();
    if &color != &PrintColor::None {
        let c = color.get_color_triple();
        string += format!("{}", color::Fg(Rgb(c.0, c.1, c.2))).as_str();
    }
    string += s;
    string += format!("{}", style::Reset).as_str();
    print!("{}", string);
    io::stdout().flush().ok();
}

pub fn binpick_print_new_line() {
    binpick_print("\n", PrintMode::Print, PrintColor::None, false);
}

/// Enum that is used in the print functions.
/// Println will cause a new line after each line, while Print will not.
#[derive(Clone, Debug)]
pub enum PrintMode {
    Println,
    Print
}

/// Defines color for a binpick print command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintColor {
    None,
    Blue,
    Green,
    Red,
    Yellow,
    Cyan,
    Magenta
}
impl PrintColor {
    pub fn get_color_triple(&self) -> (u8, u8, u8) {
        match self {
            PrintColor::None => { (0,0,0) }
            PrintColor::Blue => { return (0, 0, 255) }
            PrintColor::Green => { return (0, 255, 0) }
            PrintColor::Red => { return (255, 0, 0) }
            PrintColor::Yellow => { return (255, 255, 0) }
            PrintColor::Cyan => { return (0, 255, 255) }
            PrintColor::Magenta => { return (255, 0, 255) }
        }
    }
}
