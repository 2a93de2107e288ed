use clap::Parser;

/// This is a survey analysis program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file containing the survey schema: a JSON document describing
    /// the questions, their types and their options. For more information about the
    /// file format, read the documentation.
    #[clap(short, long, value_parser)]
    pub schema: Option<String>,

    /// (file path) The file containing the survey responses.
    #[clap(short, long, value_parser)]
    pub data: Option<String>,

    /// (default json) The type of the response file: 'json' or 'xlsx'.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (question id) The question to analyze. If not specified, every analyzable
    /// question is included in the summary.
    #[clap(short, long, value_parser)]
    pub question: Option<String>,

    /// (repeatable) An ad-hoc filter, written as 'question_id=value' or
    /// 'question_id!=value' for a negated filter.
    #[clap(short, long, value_parser)]
    pub filter: Vec<String>,

    /// (repeatable) A demographic restriction, written as 'question_id:value1,value2'.
    /// Only the listed values (and 'Other' if named) are accepted for that question.
    #[clap(short, long, value_parser)]
    pub accept: Vec<String>,

    /// (default and) How ad-hoc filters combine: 'and' or 'or'.
    #[clap(short, long, value_parser)]
    pub mode: Option<String>,

    /// (list of comma-separated question ids) The demographic questions. Each one
    /// carries an always-on inclusion filter over its declared options.
    #[clap(long, value_parser, use_value_delimiter = true)]
    pub demographics: Vec<String>,

    /// (file path, 'stdout' or empty) If specified, the analysis summary will be
    /// written in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing an analysis summary in JSON format.
    /// If provided, svyan will check that the computed output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, prints the analyzable questions and exits.
    #[clap(long, takes_value = false)]
    pub list_questions: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
