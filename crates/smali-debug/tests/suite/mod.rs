mod deferred_breakpoints;
mod source_position;
