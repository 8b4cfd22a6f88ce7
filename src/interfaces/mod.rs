pub mod terminal_chart;

pub use terminal_chart::TerminalChart;
